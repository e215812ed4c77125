use seachest::cli::info::InfoArgs;

fn main() -> std::process::ExitCode {
    seachest::cli::run::<InfoArgs>()
}
