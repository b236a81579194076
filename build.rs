// Stamps the build date into the library version string written to every archive.
fn main() {
    println!("cargo:rerun-if-env-changed=ABC_GIT_BUILD_DATE");

    let stamp = match std::env::var("ABC_GIT_BUILD_DATE") {
        Ok(date) => date,
        Err(_) => {
            let format = time::format_description::parse(
                "[month repr:short] [day padding:space] [year] [hour]:[minute]:[second]",
            );
            match format {
                Ok(format) => time::OffsetDateTime::now_utc()
                    .format(&format)
                    .unwrap_or_else(|_| "unknown".to_string()),
                Err(_) => "unknown".to_string(),
            }
        }
    };

    println!("cargo:rustc-env=ABC_GIT_BUILD_DATE={}", stamp);
}
