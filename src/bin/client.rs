//! Standalone client binary for BeamStore
//!
//! Provides a command-line console for interacting with the server

use beamstore::client::DEFAULT_QUIET_PERIOD;
use beamstore::config::parse_delimiter;
use beamstore::{Client, Delimiters};
use clap::Parser;
use std::io::{self, Write};

/// BeamStore console client
#[derive(Parser, Debug)]
#[command(name = "beamstore-client")]
#[command(about = "Interactive console for a BeamStore server")]
struct Args {
    /// Server address
    #[arg(default_value = "127.0.0.1:12345")]
    server: String,

    /// Field delimiter the server was started with
    #[arg(long, default_value = "\\t", value_parser = delimiter)]
    field_delim: u8,

    /// Message delimiter the server was started with
    #[arg(long, default_value = "\\n", value_parser = delimiter)]
    message_delim: u8,
}

fn delimiter(raw: &str) -> Result<u8, String> {
    parse_delimiter(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let delimiters = Delimiters::new(args.field_delim, args.message_delim);

    println!("Connecting to BeamStore server at {}...", args.server);
    let mut client = Client::connect_with(&args.server, delimiters).await?;
    println!("Connected! Type 'help' for available commands or 'quit' to exit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "help" => {
                print_help();
            }
            _ => {
                if let Err(e) = handle_command(&mut client, input).await {
                    println!("Error: {}", e);
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

async fn handle_command(client: &mut Client, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut parts = input.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let key = parts.next();
    let rest = parts.next();

    match (command, key) {
        ("put", Some(key)) => {
            client.put(key.as_bytes(), rest.unwrap_or_default().as_bytes()).await?;
            println!("OK");
        }
        ("get", Some("*")) => {
            for value in client.get_all(DEFAULT_QUIET_PERIOD).await? {
                print_value(&value);
            }
        }
        ("get", Some(key)) => {
            let value = client.get(key.as_bytes()).await?;
            print_value(&value);
        }
        ("con", Some("*")) => {
            for value in client.consume_all(DEFAULT_QUIET_PERIOD).await? {
                print_value(&value);
            }
        }
        ("con", Some(key)) => {
            let value = client.consume(key.as_bytes()).await?;
            print_value(&value);
        }
        ("del", Some(key)) => {
            client.del(key.as_bytes()).await?;
            println!("OK");
        }
        ("cnt", None) => {
            client.count().await?;
            println!("OK (see server log)");
        }
        ("det", None) => {
            client.detail().await?;
            println!("OK (see server log)");
        }
        ("log", None) => {
            client.toggle_log().await?;
            println!("OK");
        }
        _ => {
            println!("Unknown command: {}. Type 'help' for available commands.", input);
        }
    }

    Ok(())
}

fn print_value(value: &[u8]) {
    if value.is_empty() {
        println!("(empty)");
    } else {
        println!("{}", String::from_utf8_lossy(value));
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  put <key> <value>  - Store a value");
    println!("  get <key>          - Fetch a value (* for all)");
    println!("  con <key>          - Fetch and delete a value (* for all)");
    println!("  del <key>          - Delete a key (* for all)");
    println!("  cnt                - Log the key count on the server");
    println!("  det                - Log every entry on the server");
    println!("  log                - Toggle server diagnostic logging");
    println!("  help               - Show this help message");
    println!("  quit               - Exit the client");
}
