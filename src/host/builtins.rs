//! Built-in console commands seeded by the host.

use std::fmt::Write as _;
use std::sync::{Arc, Weak};

use anyhow::{bail, Context, Result};

use crate::console::registry::{CommandDescriptor, CommandFn};
use crate::host::HostCore;

const OWNER: &str = "core";

fn command(
    core: &Arc<HostCore>,
    name: &str,
    usage: &str,
    summary: &str,
    run: impl Fn(&Arc<HostCore>, &[String]) -> Result<String> + Send + Sync + 'static,
) -> CommandDescriptor {
    let weak: Weak<HostCore> = Arc::downgrade(core);
    let handler: CommandFn = Arc::new(move |args| {
        let core = weak.upgrade().context("host is shutting down")?;
        run(&core, args)
    });
    CommandDescriptor::new(OWNER, name, usage, summary, handler)
}

/// Register every built-in command. Called at construction and again after
/// a wholesale reload clears the registry.
pub(crate) fn seed(core: &Arc<HostCore>) {
    let registry = core.console().registry();

    registry.register(
        command(core, "help", "[-p <plugin>]|[<command>]", "displays this prompt", cmd_help)
            .with_long_help(
                "Displays the help prompt. Use '-p <plugin>' to list every command \
                 owned by one plugin, or pass a command name to get its detailed \
                 description. The leading '/' is not needed for the command name \
                 argument.",
            ),
    );
    registry.register(command(
        core,
        "plugins",
        "",
        "lists installed plugins",
        cmd_plugins,
    ));
    registry.register(command(
        core,
        "version",
        "",
        "prints the host version",
        cmd_version,
    ));
    registry.register(
        command(
            core,
            "reload",
            "",
            "reloads every plugin",
            |core: &Arc<HostCore>, _args: &[String]| {
                core.reload();
                Ok("plugins reloaded.".to_string())
            },
        )
        .with_long_help(
            "Discards the entire plugin set and the command registry, then re-runs \
             plugin discovery from scratch. Commands are briefly unavailable while \
             the reload runs.",
        ),
    );
    registry.register(
        command(
            core,
            "alias",
            "<-add|-remove|-list|-reload|-h> [args]",
            "manages persisted command aliases",
            cmd_alias,
        )
        .with_long_help(
            "Manages the alias store. '-add <alias> <command>' maps a new alias, \
             '-remove <alias>' deletes one, '-list' shows every mapping, '-reload' \
             re-reads the alias file, '-h' prints usage. Alias keys and target \
             commands are both unique.",
        ),
    );
    registry.register(command(
        core,
        "clear",
        "",
        "clears the console",
        |core: &Arc<HostCore>, _args: &[String]| {
            core.log().clear();
            Ok("clear".to_string())
        },
    ));
    registry.register(command(
        core,
        "sys",
        "",
        "displays system info",
        cmd_sys,
    ));
    registry.register(command(
        core,
        "lanes",
        "",
        "lists worker lanes and queue depths",
        cmd_lanes,
    ));
    registry.register(command(
        core,
        "exit",
        "",
        "stops the host",
        |core: &Arc<HostCore>, _args: &[String]| {
            core.request_exit();
            Ok("exiting.".to_string())
        },
    ));
}

fn cmd_help(core: &Arc<HostCore>, args: &[String]) -> Result<String> {
    let registry = core.console().registry();
    let mut output = String::new();

    if args.len() == 1 {
        writeln!(output, ":: Command List :: (<> = required, [] = optional)")?;
        for owner in registry.owners() {
            let Some(commands) = registry.plugin_commands(&owner) else {
                continue;
            };
            writeln!(output, "[{owner}]")?;
            for descriptor in commands {
                if descriptor.usage.is_empty() {
                    writeln!(output, "/{} : {}", descriptor.name, descriptor.summary)?;
                } else {
                    writeln!(
                        output,
                        "/{} {} : {}",
                        descriptor.name, descriptor.usage, descriptor.summary
                    )?;
                }
            }
        }
    } else if args.len() == 3 && args[1].to_lowercase().starts_with("-p") {
        let Some(commands) = registry.plugin_commands(&args[2]) else {
            bail!("Plugin not found.");
        };
        writeln!(
            output,
            "Available commands for {} (<> = required, [] = optional):",
            args[2]
        )?;
        for descriptor in commands {
            writeln!(
                output,
                "/{} {} : {}.",
                descriptor.name, descriptor.usage, descriptor.summary
            )?;
        }
    } else if args.len() == 2 && !args[1].to_lowercase().starts_with("-p") {
        let name = args[1].trim_start_matches('/');
        let Some(descriptor) = registry.descriptor(name) else {
            bail!("Command not found.");
        };
        writeln!(output, "Command description (<> = required, [] = optional):")?;
        writeln!(output, "Command: /{} {}", descriptor.name, descriptor.usage)?;
        if descriptor.long_help.is_empty() {
            writeln!(output, "Description: {}", descriptor.summary)?;
        } else {
            writeln!(output, "Short description: {}", descriptor.summary)?;
            writeln!(output, "Long description: {}", descriptor.long_help)?;
        }
    } else if args.len() == 2 {
        bail!("Please specify a plugin.");
    } else {
        bail!("Too many arguments.");
    }

    Ok(output.trim_end().to_string())
}

fn cmd_plugins(core: &Arc<HostCore>, _args: &[String]) -> Result<String> {
    let plugins = core.plugins().names();
    let mut output = String::from("Plugins:");
    if plugins.is_empty() {
        output.push_str("\n(none)");
    }
    for (name, version) in plugins {
        write!(output, "\n--{name} v{version}")?;
    }
    Ok(output)
}

fn cmd_version(_core: &Arc<HostCore>, _args: &[String]) -> Result<String> {
    Ok(format!("emberhost v{}", env!("CARGO_PKG_VERSION")))
}

fn cmd_alias(core: &Arc<HostCore>, args: &[String]) -> Result<String> {
    const USAGE: &str = "usage: /alias <-add <alias> <command>|-remove <alias>|-list|-reload|-h>";
    let aliases = core.aliases();

    match args.get(1).map(String::as_str) {
        Some("-add") => {
            if args.len() < 4 {
                bail!("{USAGE}");
            }
            aliases.add(&args[2], &args[3..].join(" "))?;
            Ok(format!("Alias {:?} added.", args[2]))
        }
        Some("-remove") => {
            if args.len() != 3 {
                bail!("{USAGE}");
            }
            if aliases.remove(&args[2])? {
                Ok(format!("Alias {:?} removed.", args[2]))
            } else {
                bail!("Alias not found.");
            }
        }
        Some("-list") => {
            let pairs = aliases.list();
            if pairs.is_empty() {
                return Ok("(no aliases)".to_string());
            }
            let mut output = String::from("Aliases:");
            for (alias, target) in pairs {
                write!(output, "\n{alias} -> {target}")?;
            }
            Ok(output)
        }
        Some("-reload") => {
            aliases.reload()?;
            Ok("Aliases reloaded.".to_string())
        }
        Some("-h") | None => Ok(USAGE.to_string()),
        Some(other) => bail!("unknown alias action {other:?}; {USAGE}"),
    }
}

fn cmd_sys(_core: &Arc<HostCore>, _args: &[String]) -> Result<String> {
    use sysinfo::System;

    let mut sys = System::new_all();
    sys.refresh_all();

    let mut output = String::new();
    writeln!(
        output,
        "OS: {} {}",
        System::name().unwrap_or_else(|| "unknown".to_string()),
        System::os_version().unwrap_or_default()
    )?;
    writeln!(
        output,
        "Kernel: {}",
        System::kernel_version().unwrap_or_else(|| "unknown".to_string())
    )?;
    writeln!(
        output,
        "Host: {}",
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    )?;
    writeln!(output, "CPUs: {}", sys.cpus().len())?;
    writeln!(
        output,
        "Memory: {} / {} MiB",
        sys.used_memory() / (1024 * 1024),
        sys.total_memory() / (1024 * 1024)
    )?;
    Ok(output.trim_end().to_string())
}

fn cmd_lanes(core: &Arc<HostCore>, _args: &[String]) -> Result<String> {
    let scheduler = core.scheduler();
    let mut output = String::from(":: Lanes ::");
    write!(output, "\nmain: {} queued", scheduler.main_pending())?;
    for (name, depth) in scheduler.lane_depths() {
        write!(output, "\n{name}: {depth} queued")?;
    }
    Ok(output)
}
