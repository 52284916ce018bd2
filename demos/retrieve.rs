//! An interactive mail reader.
//!
//! Credentials are read from the environment (or a `.env` file): `POP3_USER` and
//! `POP3_PASSWORD`. Set `RUST_LOG=popfetch=debug` to watch the session.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::Parser;
use popfetch::{ClientBuilder, Operation, Outcome, Provider};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retrieve", about = "Read mail from a POP3 mailbox")]
struct Args {
    /// Mailbox provider: y(andex), m(ail.ru) or r(ambler)
    #[arg(short, long, conflicts_with = "host")]
    provider: Option<Provider>,

    /// POP3 server to connect to instead of a known provider
    #[arg(long)]
    host: Option<String>,

    /// Port of the POP3 server
    #[arg(long, default_value_t = popfetch::POP3S_PORT)]
    port: u16,

    /// Seconds to wait for the server before giving up
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Refuse messages larger than this many bytes
    #[arg(long)]
    max_size: Option<usize>,

    /// Trace every line sent and received
    #[arg(long)]
    debug: bool,
}

const MENU: &str = "\
1 <n> <lines>  preview message n
2 <n>          retrieve message n
0              quit";

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let user = std::env::var("POP3_USER")?;
    let password = std::env::var("POP3_PASSWORD")?;

    let mut builder = match (args.provider, args.host) {
        (_, Some(host)) => ClientBuilder::new(host, args.port),
        (Some(provider), None) => ClientBuilder::new(provider.host().to_string(), provider.port()),
        (None, None) => return Err("either --provider or --host is required".into()),
    };
    builder.read_timeout(Duration::from_secs(args.timeout));
    if let Some(max) = args.max_size {
        builder.max_message_size(max);
    }

    let mut client = builder.connect()?;
    client.debug = args.debug;
    let mut session = client.login(&user, &password).map_err(|e| e.0)?;
    println!("{} messages in the mailbox", session.message_count()?);

    let stdin = io::stdin();
    loop {
        println!("{}", MENU);
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // end of input; dropping the session says goodbye
            return Ok(());
        }
        let op: Operation = match line.parse() {
            Ok(op) => op,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match session.dispatch(&op)? {
            Outcome::Count(n) => println!("{} messages in the mailbox", n),
            Outcome::Message(message) => println!("{}\n", message),
            Outcome::Rejected(reply) => eprintln!("server refused: {}", reply),
            Outcome::Terminated => return Ok(()),
        }
    }
}
