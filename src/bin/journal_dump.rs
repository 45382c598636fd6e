//! Prints the commands of a journal file, one per line with its byte offset.

use std::path::PathBuf;

use clap::Parser;
use paint_journal::JournalEntries;

#[derive(Parser)]
#[command(about = "Decode a paint journal")]
struct Args {
    /// Journal file to decode.
    #[arg(index = 1)]
    journal: PathBuf,

    /// Stop at this byte offset, as recorded in a document description.
    #[arg(long)]
    until: Option<u64>,
}

fn main() -> paint_journal::Result<()> {
    let args = Args::parse();
    let bytes = std::fs::read(&args.journal)?;
    let until = args.until.unwrap_or(bytes.len() as u64);

    let mut count = 0usize;
    for entry in JournalEntries::new(&bytes) {
        let (offset, command) = entry?;
        if offset >= until {
            break;
        }
        println!("{offset:>10}  {:<28}  {command:?}", command.kind().to_string());
        count += 1;
    }
    println!("{count} commands");
    Ok(())
}
