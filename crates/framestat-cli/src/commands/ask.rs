//! One-shot query against a running session's listener.

pub fn run(addr: &str, command: &str) {
    match framestat_server::ask(addr, command) {
        Ok(reply) => println!("{reply}"),
        Err(e) => {
            eprintln!("Error querying {addr}: {e}");
            std::process::exit(1);
        }
    }
}
