use seachest::cli::sample::SampleArgs;

fn main() -> std::process::ExitCode {
    seachest::cli::run::<SampleArgs>()
}
