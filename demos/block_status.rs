use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    retro_blocks::apps::run_block_status(std::env::args().skip(1))
}
