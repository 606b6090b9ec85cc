//! Hello World plugin - a minimal example plugin for emberhost.

use std::sync::Arc;

use emberhost::{CommandDescriptor, HostHandle, Plugin, PluginRegistrar};

struct HelloWorld;

impl Plugin for HelloWorld {
    fn name(&self) -> &str {
        "Hello World"
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn init(&mut self, host: &HostHandle) -> anyhow::Result<()> {
        host.register_command(CommandDescriptor::new(
            self.name(),
            "hello",
            "[name]",
            "says hello",
            Arc::new(|args| {
                let name = args.get(1).map(String::as_str).unwrap_or("World");
                Ok(format!("Hello, {name}!"))
            }),
        ));
        host.log_system("Hello World plugin ready");
        Ok(())
    }

    fn submit(&mut self, message: &str) -> bool {
        message.to_lowercase().contains("hello")
    }
}

/// Plugin entry point looked up by the host's loader.
#[no_mangle]
pub fn _plugin_entry(registrar: &mut PluginRegistrar) {
    registrar.register(Box::new(HelloWorld));
}
