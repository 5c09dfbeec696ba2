fn main() {
    if let Err(e) = anamnesis_lib::run() {
        eprintln!("anamnesis: {e}");
        std::process::exit(1);
    }
}
