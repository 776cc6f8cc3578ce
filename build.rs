// Exposes BUILD_NUMBER (from a file written by CI) to the version string.
fn main() {
    let build = std::fs::read_to_string("BUILD_NUMBER").map_or_else(
        |_| String::from("0"),
        |contents| contents.trim().to_owned(),
    );
    println!("cargo:rustc-env=BUILD_NUMBER={build}");
    println!("cargo:rerun-if-changed=BUILD_NUMBER");
}
