//! Interactive command example
//!
//! Runs a remote command and answers its prompts as they appear: a
//! confirmation prompt gets `y`, a sudo password prompt gets the password.
//! Everything no rule consumed is printed as it arrives.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example interactive -- --host localhost --user your_username --password your_password \
//!     --command "sudo -S apt-get remove cowsay"
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use sshinteract::transport::HostKeyVerification;
use sshinteract::{Channel, InteractionSession, Rule, SshConfig, SshTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("=== sshinteract Interactive Command Example ===\n");

    let mut config = SshConfig::new(&args.host, &args.user)
        .with_port(args.port)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_host_key_verification(HostKeyVerification::Disabled);

    if let Some(password) = &args.password {
        config = config.with_password(password.as_str());
    } else if let Some(key_path) = &args.key {
        config = config.with_private_key(key_path, None);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    println!("Connecting to {}:{}...", args.host, args.port);
    let transport = SshTransport::connect(config).await?;
    println!("Connected!\n");

    println!("Running {:?}\n", args.command);
    let streams = transport.exec(&args.command).await?;

    let session = InteractionSession::builder()
        .rule(
            Rule::regex(r"(?i)(\[y/n\]|remove .*\?)\s*$")?
                .named("confirm")
                .partials()
                .send("y\n"),
        )
        .on_event(|event| match event.channel {
            Channel::StandardOutput => println!("  {}", event.as_str_lossy()),
            Channel::StandardError => eprintln!("! {}", event.as_str_lossy()),
        })
        .build();

    if let Some(password) = &args.password {
        session.register(
            Rule::regex(r"(?i)password.*:\s*$")?
                .named("sudo password")
                .partials()
                .once()
                .send_hidden(format!("{}\n", password)),
        )?;
    }

    let report = session.run(streams).await?;

    println!("\n--- Summary ---");
    println!(
        "Lines: {} stdout, {} stderr",
        report.lines_on(Channel::StandardOutput),
        report.lines_on(Channel::StandardError)
    );
    println!("Rules fired: {}", report.fired.len());
    for failure in &report.dispatch_failures {
        println!("Dispatch failure: {}", failure);
    }

    transport.close().await?;
    println!("\nDisconnected.");

    Ok(())
}

struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    command: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();

        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut command = "rm -i /tmp/sshinteract-demo".to_string();
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--key" | "-k" => {
                    i += 1;
                    if i < args.len() {
                        key = Some(PathBuf::from(&args[i]));
                    }
                }
                "--command" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        command = args[i].clone();
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            command,
            timeout,
        }
    }

    fn print_help() {
        println!(
            r#"sshinteract interactive example

Runs a remote command and answers its prompts automatically.

USAGE:
    cargo run --example interactive -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication and sudo prompts
    -k, --key <PATH>         Path to SSH private key
    -c, --command <CMD>      Command to run [default: rm -i /tmp/sshinteract-demo]
    -t, --timeout <SECS>     Connection timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}
