use bytes::Bytes;
use clap::Parser;
use framelink::{setup_local_tracing, AcceptOptions, AppResult, LinkEvent, LinkOptions, Reactor};
use tokio::runtime;
use tracing::{error, info};

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Command,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Parser)]
pub enum Command {
    /// run an echo server on the given address
    Serve { addr: String },
    /// send payloads to an echo server and print the replies
    Send { addr: String, messages: Vec<String> },
}

fn main() {
    if let Err(e) = run() {
        error!("echo demo failed: {}", e);
        eprintln!("echo demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> AppResult<()> {
    let commandline: CommandLine = CommandLine::parse();
    if std::env::var("RUST_LOG").is_err() {
        let log_level = match commandline.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    setup_local_tracing()?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    match commandline.command {
        Command::Serve { addr } => rt.block_on(serve(addr)),
        Command::Send { addr, messages } => rt.block_on(send(addr, messages)),
    }
}

async fn serve(addr: String) -> AppResult<()> {
    let reactor = Reactor::start()?;
    let server = reactor.accept(&addr, AcceptOptions::default()).await?;
    info!("echo server listening on {}", server.local_addr);

    loop {
        let handle = tokio::select! {
            res = server.accepted.recv() => match res {
                Ok(handle) => handle,
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        };
        tokio::spawn(async move {
            while let Ok(event) = handle.events.recv().await {
                match event {
                    LinkEvent::Payload(payload) => {
                        if handle.sender.send(payload).await.is_err() {
                            break;
                        }
                    }
                    LinkEvent::Closed => break,
                    _ => {}
                }
            }
        });
    }

    reactor.shutdown();
    Ok(())
}

async fn send(addr: String, messages: Vec<String>) -> AppResult<()> {
    let reactor = Reactor::start()?;
    let client = reactor.connect(addr, LinkOptions::default());

    let mut expected = 0usize;
    for message in &messages {
        if client
            .sender
            .send(Bytes::from(message.clone().into_bytes()))
            .await
            .is_ok()
        {
            expected += 1;
        }
    }

    let mut received = 0usize;
    while received < expected {
        match client.events.recv().await {
            Ok(LinkEvent::Payload(payload)) => {
                println!("{}", String::from_utf8_lossy(&payload));
                received += 1;
            }
            Ok(LinkEvent::Connected) => info!("connected"),
            Ok(LinkEvent::Disconnected) => info!("disconnected, retrying"),
            Ok(LinkEvent::Closed) | Err(_) => break,
        }
    }

    reactor.shutdown();
    Ok(())
}
