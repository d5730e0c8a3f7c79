fn main() {
    if let Err(err) = annotation_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
