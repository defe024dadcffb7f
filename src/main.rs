use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    sidechat::cli::main()
}
