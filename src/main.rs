fn main() {
    cloud_pipeline::cli::run();
}
