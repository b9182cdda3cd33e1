use clap::{Parser, Subcommand};
use dashgo::{
    components::{Pagination, DEFAULT_SIBLINGS},
    config::AppConfig,
    services::{CreateUserRequest, HttpUsersApi, QueryTimings, UserService, UsersApi},
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dashgo-cli")]
#[command(about = "CLI tool for browsing and creating users through the users API", long_about = None)]
struct Cli {
    /// Override API_BASE_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List one page of users
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Show a single user
    Show {
        /// User id
        id: String,
    },

    /// Create a new user
    Create {
        /// Full name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

fn get_password(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn confirm_password(prompt: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let password = get_password(prompt)?;
    let confirm = get_password("Confirm password")?;
    Ok((password, confirm))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let base_url = cli.api_url.unwrap_or_else(|| config.api_base_url.clone());
    let api = Arc::new(HttpUsersApi::new(&base_url, config.api_timeout)?);

    match cli.command {
        Commands::Users { command } => match command {
            UserCommands::List { page } => {
                match api.list_users(page.max(1), config.users_per_page).await {
                    Ok(user_page) => {
                        if user_page.users.is_empty() {
                            println!("No users found.");
                        } else {
                            println!("{:<10} {:<30} {:<40} {:<20}", "ID", "Name", "Email", "Created");
                            println!("{}", "-".repeat(100));
                            for user in &user_page.users {
                                println!(
                                    "{:<10} {:<30} {:<40} {:<20}",
                                    user.id, user.name, user.email, user.created_at
                                );
                            }
                        }

                        let pagination = Pagination::new(
                            "/users",
                            user_page.total_count,
                            page,
                            config.users_per_page,
                            DEFAULT_SIBLINGS,
                        );
                        println!(
                            "\n{} - {} of {} (page {} of {})",
                            pagination.range_start,
                            pagination.range_end,
                            pagination.total_count,
                            pagination.current_page,
                            pagination.last_page
                        );
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to list users: {}", err);
                        std::process::exit(1);
                    }
                }
            }

            UserCommands::Show { id } => match api.get_user(&id).await {
                Ok(user) => {
                    println!("  ID: {}", user.id);
                    println!("  Name: {}", user.name);
                    println!("  Email: {}", user.email);
                    println!("  Created: {}", user.created_at);
                }
                Err(err) => {
                    eprintln!("❌ Failed to fetch user '{}': {}", id, err);
                    std::process::exit(1);
                }
            },

            UserCommands::Create {
                name,
                email,
                password,
            } => {
                let (password, password_confirm) = if let Some(pw) = password {
                    (pw.clone(), pw)
                } else {
                    confirm_password("Password")?
                };

                let user_service =
                    UserService::new(api, config.users_per_page, QueryTimings::default());

                let request = CreateUserRequest {
                    name,
                    email,
                    password,
                    password_confirm,
                };

                match user_service.create_user(request).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Name: {}", user.name);
                        println!("  Email: {}", user.email);
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to create user: {}", err);
                        std::process::exit(1);
                    }
                }
            }
        },
    }

    Ok(())
}
