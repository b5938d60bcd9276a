//! runt-inspect CLI entry point.
//!
//! Hosts a single console prompt against a live kernel and prints the
//! contextual help panel as it changes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use runt_inspector::commands::{Action, CommandId};
use runt_inspector::layout::{layout_path, LayoutRestorer};
use runt_inspector::panel::PanelContent;
use runt_inspector::rendermime::RenderMime;
use runt_inspector::settings::load_settings;
use runt_inspector::{
    ConsolePanel, FocusTracker, HeadlessShell, InspectorManager, KernelSession, RuntimeKernel,
    SurfaceInspection,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "runt-inspect")]
#[command(about = "Contextual help from a Jupyter kernel while you type")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive console with the help panel attached
    Console {
        /// Kernelspec to launch
        #[arg(default_value = "python3")]
        kernel: String,

        /// Attach to a running kernel instead of launching one
        #[arg(long)]
        connection_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match cli.command {
        Commands::Console {
            kernel,
            connection_file,
        } => console(kernel, connection_file).await,
    }
}

async fn console(kernel_name: String, connection_file: Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings();
    // A terminal can only show text
    settings.mime_ranking = RenderMime::new(settings.mime_ranking)
        .prefer("text/plain")
        .ranking()
        .to_vec();

    let kernel = Arc::new(match connection_file {
        Some(path) => RuntimeKernel::from_connection_file(&path).await?,
        None => RuntimeKernel::start(&kernel_name).await?,
    });
    let session = Arc::new(KernelSession::with_kernel(kernel.clone()));

    let manager = Arc::new(InspectorManager::new(
        Arc::new(HeadlessShell::new()),
        &settings,
    ));
    let focus = Arc::new(FocusTracker::new());
    let consoles = SurfaceInspection::<ConsolePanel>::new(manager.clone(), focus.clone(), settings);

    // Print every panel the manager opens
    let weak = Arc::downgrade(&manager);
    manager.opened_changed().connect(move |open: &bool| {
        if !*open {
            println!("-- contextual help closed --");
            return;
        }
        let Some(panel) = weak.upgrade().and_then(|m| m.panel()) else {
            return;
        };
        println!("-- {} --", panel.label());
        panel.content_changed().connect(print_content);
    });

    let console = ConsolePanel::new("console-1", session);
    console.new_prompt("");
    consoles.track(&console);
    focus.focus(Some("console-1"));
    consoles.restored();

    let restorer = LayoutRestorer::new(manager.clone(), layout_path());
    // First run: show the panel
    if restorer.saved().is_none() {
        manager.execute(Action::Open {
            text: None,
            refresh: false,
        });
    } else {
        restorer.restore();
    }

    println!(
        "Connected to {}. Type code to inspect it, :help for commands.",
        kernel.kernel_name().unwrap_or("kernel")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, Some(rest.to_string())),
            None => (line, None),
        };

        match command {
            ":quit" | ":q" => break,
            ":open" => manager.execute(Action::Open {
                text: rest,
                refresh: true,
            }),
            ":close" => manager.execute(Action::Close),
            ":toggle" => manager.execute(Action::Toggle { text: rest }),
            ":trigger" => {
                if manager.is_enabled(CommandId::Trigger) {
                    manager.execute(Action::Trigger);
                } else {
                    println!("Trigger is only available while auto update is paused (:standby)");
                }
            }
            ":standby" => {
                manager.execute(Action::ToggleStandby);
                println!(
                    "Auto update {}",
                    if manager.is_toggled(CommandId::ToggleStandby) {
                        "on"
                    } else {
                        "off"
                    }
                );
            }
            ":status" => {
                println!("panel open:    {}", manager.is_open());
                println!("standby:       {}", manager.is_standby());
                println!("auto update:   {}", manager.auto_update());
                println!("pending:       {}", kernel.pending_count());
                println!(
                    "kernel:        {}",
                    if kernel.is_connected() { "connected" } else { "disconnected" }
                );
            }
            ":help" => {
                for (usage, command) in [
                    (":open [text]", CommandId::Open),
                    (":close", CommandId::Close),
                    (":toggle", CommandId::Toggle),
                    (":trigger", CommandId::Trigger),
                    (":standby", CommandId::ToggleStandby),
                ] {
                    println!("  {:<14} {}", usage, command.label());
                }
                println!("  {:<14} Show panel state", ":status");
                println!("  {:<14} Exit", ":quit");
            }
            _ if command.starts_with(':') => println!("Unknown command {}, try :help", command),
            _ => {
                if let Some(prompt) = console.prompt() {
                    prompt.editor().set_source(line);
                }
            }
        }
    }

    info!("Shutting down");
    drop(restorer);
    console.dispose();
    kernel.shutdown().await?;
    Ok(())
}

fn print_content(content: &PanelContent) {
    match content {
        PanelContent::Placeholder(text) => println!("{}", text),
        PanelContent::Rendered(rendered) => match rendered.text() {
            Some(text) => println!("{}", text),
            None => println!("[{}] {}", rendered.mime_type, rendered.data),
        },
    }
}
