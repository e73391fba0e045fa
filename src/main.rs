//! Storycase CLI entry point

fn main() {
    std::process::exit(storycase::cli::run());
}
