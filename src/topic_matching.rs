//! Topic names, topic filters, and the `+`/`#` wildcard matching rules.

/// True when `topic` matches the subscription `filter` under MQTT
/// wildcard semantics: `+` matches exactly one level, a terminal `#`
/// matches the remaining levels (including none). Filters starting with a
/// wildcard do not match `$`-prefixed topics.
#[must_use]
pub fn topic_matches_filter(topic: &str, filter: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let topic_levels: Vec<&str> = topic.split('/').collect();
    let filter_levels: Vec<&str> = filter.split('/').collect();

    for (i, filter_level) in filter_levels.iter().enumerate() {
        // A terminal '#' matches the remaining levels, including none:
        // "a/#" matches "a/b/c" and "a" alike.
        if *filter_level == "#" {
            return true;
        }
        match topic_levels.get(i) {
            Some(topic_level) if *filter_level == "+" || filter_level == topic_level => {}
            _ => return false,
        }
    }
    topic_levels.len() == filter_levels.len()
}

/// A topic name is publishable: non-empty and wildcard-free.
#[must_use]
pub fn is_valid_topic_name(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#'])
}

/// A topic filter is subscribable: non-empty, `+` alone in its level, `#`
/// alone in the final level.
#[must_use]
pub fn is_valid_topic_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') {
            if *level != "#" || i != levels.len() - 1 {
                return false;
            }
        } else if level.contains('+') && *level != "+" {
            return false;
        }
    }
    true
}
