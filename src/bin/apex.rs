use apex::app::command_handlers;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match command_handlers::run_cli(args) {
        Ok(output) => {
            println!("{}", output.text);
            std::process::exit(output.exit_code);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
