//! Stopwatch plugin - demonstrates delayed tasks and worker lanes.

use std::sync::Arc;
use std::time::Duration;

use emberhost::{CommandDescriptor, HostHandle, Plugin, PluginRegistrar, Task};

struct Stopwatch;

impl Plugin for Stopwatch {
    fn name(&self) -> &str {
        "Stopwatch"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn init(&mut self, host: &HostHandle) -> anyhow::Result<()> {
        host.create_lane("stopwatch");

        let handle = host.clone();
        host.register_command(CommandDescriptor::new(
            self.name(),
            "countdown",
            "<seconds>",
            "announces when the given number of seconds has passed",
            Arc::new(move |args| {
                let seconds: u64 = args
                    .get(1)
                    .and_then(|raw| raw.parse().ok())
                    .ok_or_else(|| anyhow::anyhow!("usage: /countdown <seconds>"))?;

                let announce = handle.clone();
                handle.queue_on_main_delayed(
                    Task::new(move || {
                        announce.log_system(format!("{seconds} second(s) are up."));
                    }),
                    Duration::from_secs(seconds),
                );
                Ok(format!("counting down {seconds} second(s)."))
            }),
        ));
        Ok(())
    }

    fn submit(&mut self, _message: &str) -> bool {
        false
    }
}

/// Plugin entry point looked up by the host's loader.
#[no_mangle]
pub fn _plugin_entry(registrar: &mut PluginRegistrar) {
    registrar.register(Box::new(Stopwatch));
}
