//! Keep-alive: PINGREQ on send idle.
//!
//! Every successful send signals the session's activity notifier. This
//! task waits on that signal with a `keep_alive` timeout; only a full
//! window with no sends produces a PINGREQ, so regular traffic keeps the
//! timer deferred.

use crate::error::MqttError;
use crate::packet::{Packet, PacketType};
use std::time::Duration;

use super::SessionContext;

const PINGRESP_DEADLINE: Duration = Duration::from_secs(10);

pub(crate) async fn keepalive_task(ctx: SessionContext, keep_alive: Duration) {
    loop {
        if tokio::time::timeout(keep_alive, ctx.send_activity.notified())
            .await
            .is_ok()
        {
            // Something was sent inside the window; start a fresh one.
            continue;
        }

        let pingresp = ctx.dispatcher.register_waiter(PacketType::PingResp, None);
        match ctx.send_packet(&Packet::PingReq).await {
            Ok(()) => {}
            // The transport slot stays empty once the session is torn
            // down for good; there is nothing left to keep alive.
            Err(MqttError::NotConnected) => break,
            Err(error) => {
                // The receive path owns reconnection; just note the failure.
                tracing::warn!(error = %error, "failed to send PINGREQ");
                continue;
            }
        }
        match pingresp.recv_timeout(PINGRESP_DEADLINE).await {
            Ok(_) => tracing::trace!("PINGRESP received"),
            Err(error) => tracing::warn!(error = %error, "no PINGRESP within deadline"),
        }
    }
}
