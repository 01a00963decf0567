fn main() -> Result<(), topology_editor::EditorError> {
    // Set up logging; RUST_LOG controls verbosity
    env_logger::init();

    // Load, check and export the topology named on the command line
    topology_editor::run_cli(std::env::args().skip(1))
}
