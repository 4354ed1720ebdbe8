//! Tidepool Client CLI

use clap::Parser as ClapParser;
use std::io::{self, Write};
use tidepool::protocol::{Command, Response};
use tidepool::{Error, Parser, Result, TcpClient};
use tracing::error;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:7379")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();

    println!("Tidepool Client");
    println!("Connecting to {}...", args.server);

    let mut client = match TcpClient::connect(&args.server).await {
        Ok(client) => {
            println!("Connected successfully!");
            client
        }
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            return Err(e);
        }
    };

    // Interactive REPL
    loop {
        print!("tidepool> ");
        io::stdout().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }

                if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
                    break;
                }

                match parse_user_input(input) {
                    Ok(command) => {
                        let subscribed = matches!(command, Command::Subscribe { .. });
                        match client.execute(command).await {
                            Ok(response) => {
                                print_response(response);
                                if subscribed {
                                    listen(&mut client).await;
                                    break;
                                }
                            }
                            Err(e) => eprintln!("Error: {}", e),
                        }
                    }
                    Err(e) => eprintln!("Parse error: {}", e),
                }
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// After SUBSCRIBE the connection only receives deliveries; print them as
/// they arrive until the server closes the connection or Ctrl-C.
async fn listen(client: &mut TcpClient) {
    println!("Listening for messages (Ctrl-C to quit)...");
    loop {
        match client.next_event().await {
            Ok(Some(event)) => println!("[{}] {}", event.channel, event.payload),
            Ok(None) => {
                println!("Subscription ended");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }
}

fn parse_user_input(input: &str) -> Result<Command> {
    let args = parse_command_line(input)?;

    if args.is_empty() {
        return Err(Error::Protocol("empty command".to_string()));
    }

    Parser::from_args(args)
}

/// Parse command line with proper quote handling
fn parse_command_line(input: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current_arg = String::new();
    let mut in_quotes = false;
    let chars = input.chars();

    for ch in chars {
        match ch {
            '"' if !in_quotes => {
                in_quotes = true;
            }
            '"' if in_quotes => {
                in_quotes = false;
            }
            ' ' | '\t' if !in_quotes => {
                if !current_arg.is_empty() {
                    args.push(current_arg.clone());
                    current_arg.clear();
                }
            }
            _ => {
                current_arg.push(ch);
            }
        }
    }

    if !current_arg.is_empty() {
        args.push(current_arg);
    }

    if in_quotes {
        return Err(Error::Protocol("unclosed quotes".to_string()));
    }

    Ok(args)
}

fn print_response(response: Response) {
    match response {
        Response::Ok => println!("OK"),
        Response::Value(val) => println!("\"{}\"", val),
        Response::Nil => println!("(nil)"),
        Response::Integer(num) => println!("(integer) {}", num),
        Response::Array(items) => {
            if items.is_empty() {
                println!("(empty array)");
            }
            for (i, item) in items.iter().enumerate() {
                println!("{}) \"{}\"", i + 1, item);
            }
        }
        Response::Map(pairs) => {
            if pairs.is_empty() {
                println!("(empty hash)");
            }
            for (field, value) in pairs {
                println!("{}: \"{}\"", field, value);
            }
        }
        Response::Event { channel, payload } => println!("[{}] {}", channel, payload),
        Response::Error(err) => println!("(error) {}", err),
        Response::Pong => println!("PONG"),
        Response::Info(info) => println!("{}", info),
    }
}
