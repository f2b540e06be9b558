use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::macros::date;

use budgetio::{PasswordHash, ValidatedPassword, initialize_db};

/// A utility for creating a test database for the Budgetio web server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// The test user logs in with the username "test" and the password "test".
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let connection = Connection::open(output_path)?;

    initialize_db(&connection)?;

    println!("Creating test user...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;

    connection.execute(
        "INSERT INTO user (username, password) VALUES (?1, ?2)",
        ("test", password_hash.as_ref().to_string()),
    )?;
    let user_id = connection.last_insert_rowid();

    println!("Creating budgets, income and transactions...");

    let today = date!(2024 - 03 - 15);
    let month = today.month() as u8;
    let year = today.year();

    connection.execute(
        "INSERT INTO budget (user_id, category, amount, used, remaining, month, year) \
        VALUES (?1, 'Food', 400.0, 75.0, 325.0, ?2, ?3)",
        (user_id, month, year),
    )?;
    connection.execute(
        "INSERT INTO budget (user_id, category, amount, used, remaining, month, year) \
        VALUES (?1, 'Rent', 1200.0, 1200.0, 0.0, ?2, ?3)",
        (user_id, month, year),
    )?;
    connection.execute(
        "INSERT INTO income (user_id, amount, used, remaining, month, year) \
        VALUES (?1, 3000.0, 1275.0, 1725.0, ?2, ?3)",
        (user_id, month, year),
    )?;
    connection.execute(
        "INSERT INTO txn (user_id, institution, product, price, date, category) \
        VALUES (?1, 'Checking', 'Groceries', 75.0, '2024-03-10', 'Food')",
        (user_id,),
    )?;
    connection.execute(
        "INSERT INTO txn (user_id, institution, product, price, date, category) \
        VALUES (?1, 'Checking', 'March rent', 1200.0, '2024-03-01', 'Rent')",
        (user_id,),
    )?;

    println!("Success!");

    Ok(())
}
