use clap::{Args, Parser, Subcommand};

/// Attendance tracking for administrators and students.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Defaults to `serve` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web server.
    Serve,

    /// Add a student to the roster. Students cannot register themselves.
    AddStudent(AddStudentArgs),
}

#[derive(Args, Debug)]
pub struct AddStudentArgs {
    #[arg(long)]
    pub name: String,
    /// Also the student's login username.
    #[arg(long)]
    pub roll_no: String,
    #[arg(long)]
    pub year_of_study: i32,
    #[arg(long)]
    pub phone_number: String,
    #[arg(long)]
    pub branch: String,
    #[arg(long)]
    pub gender: String,
    /// Read from the environment so it stays out of shell history.
    #[arg(long, env = "STUDENT_PASSWORD", hide_env_values = true)]
    pub password: String,
}
