use std::process;

fn main() {
    match specgraph::run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("specgraph: {}", err);
            process::exit(2);
        }
    }
}
