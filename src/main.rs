#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;

use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use engine::ChordNode;

use config::Config;

/// How often the host loop polls the notification queue. The engine itself
/// has no push channel to the caller (spec.md §4.6: a polled queue), so this
/// is purely this demo loop's own pace, not a protocol timing.
const NOTIFICATION_POLL: Duration = Duration::from_millis(250);

fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    simple_logger::init_with_level(config.log_level.as_level())?;

    let node = ChordNode::new(config.app_port, config.chord_port, config.ip.clone());
    node.init().map_err(|e| anyhow!("init failed: {e}"))?;
    node.set_join_point(config.join.clone());
    node.start().map_err(|e| anyhow!("failed to start chord node: {e}"))?;

    log::info!(
        "chord node up: chord-port={} app-port={} join={:?}",
        config.chord_port,
        config.app_port,
        config.join,
    );

    // Demonstrates the host application's side of spec.md §4.6: drain
    // SyncNotifications and act on them (here, just log — moving the
    // affected keys is the real data-transfer layer, out of scope for the
    // core per spec.md §1).
    loop {
        while let Some(notification) = node.pop_notification() {
            log::info!(
                "predecessor changed to {}:{} — move owned keys to it",
                notification.ip,
                notification.app_port
            );
        }

        thread::sleep(NOTIFICATION_POLL);
    }
}
