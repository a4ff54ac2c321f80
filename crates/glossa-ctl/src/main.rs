//! glossa-ctl — command-line interface for the Glossa daemon.

use anyhow::{Context, Result};

mod cmd;

use cmd::{profiles, sessions, status};

const DEFAULT_PORT: u16 = 3001;

fn print_usage() {
    println!("Usage: glossa-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                                   Show daemon status and active sessions");
    println!("  sessions                                 List registered session mappings");
    println!("  session <id>                             Inspect one session");
    println!("  session <id> end [initiator]             Terminate and settle a session");
    println!("  register <id> <student> <tutor> <lang>   Register a session mapping");
    println!("  tutor <address>                          Show a tutor's ledger profile");
    println!("  student <address>                        Show a student's ledger profile");
    println!("  invalidate <address>                     Drop the cached profile for an address");
    println!("  cache flush                              Flush the whole profile cache");
    println!("  shutdown                                 Ask the daemon to shut down");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => status::cmd_status(port).await,
        ["sessions"] => sessions::cmd_session_list(port).await,
        ["session", id] => sessions::cmd_session_inspect(port, id).await,
        ["session", id, "end"] => sessions::cmd_session_end(port, id, None).await,
        ["session", id, "end", initiator] => {
            sessions::cmd_session_end(port, id, Some(initiator)).await
        }
        ["register", id, student, tutor, language] => {
            sessions::cmd_session_register(port, id, student, tutor, language).await
        }
        ["tutor", address] => profiles::cmd_tutor(port, address).await,
        ["student", address] => profiles::cmd_student(port, address).await,
        ["invalidate", address] => profiles::cmd_invalidate(port, address).await,
        ["cache", "flush"] => status::cmd_cache_flush(port).await,
        ["shutdown"] => status::cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
