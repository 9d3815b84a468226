fn main() {
    electricity_tariffs_cli::run();
}
