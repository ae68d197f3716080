fn main() {
    xsec_bands::cli::run();
}
