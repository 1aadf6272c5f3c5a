use colored::*;

const RULE: &str = "---------------------------------------------------------";

pub fn banner() {
    println!("{}", RULE.yellow());
    println!(
        "{}",
        format!("                   SNARE v{}", env!("CARGO_PKG_VERSION"))
            .green()
            .bold()
    );
    println!(
        "{}",
        "          divert, capture, rewrite on your own LAN".green()
    );
    println!("{}\n", RULE.yellow());
}
