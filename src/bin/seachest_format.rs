use seachest::cli::format::FormatArgs;

fn main() -> std::process::ExitCode {
    seachest::cli::run::<FormatArgs>()
}
