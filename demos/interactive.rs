//! Interactive fluid playground.
//!
//! Drag to stir dye into the fluid. `1`/`2`/`3` toggle the blur,
//! edge-detect, and sharpen filters; `R` resets; `Esc` quits.

fn main() {
    if let Err(e) = fluxel::window::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
