//! Prints the argon2 hash of a password for the `password_hash` field of a user in a
//! gatehouse seed file (`bootstrap.seed_file`).
//!
//! ```text
//! hash_password <password>
//! hash_password --check <password> <hash>
//! ```

use std::process::ExitCode;

use gatehouse_service::auth::password::{hash_password, verify_password};

const USAGE: &str = "usage: hash_password <password>\n       \
                     hash_password --check <password> <hash>\n\n\
                     Paste the printed hash into users[].password_hash of the seed file.";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag, password, hash] if flag == "--check" => {
            if verify_password(password, hash).is_ok() {
                println!("match");
                ExitCode::SUCCESS
            } else {
                eprintln!("password does not match the seed hash");
                ExitCode::FAILURE
            }
        }
        [password] if !password.is_empty() && !password.starts_with("--") => {
            match hash_password(password) {
                Ok(hash) => {
                    println!("{hash}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("could not hash seed password: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        _ => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
    }
}
