//! Terminal helpers: banner, prompt labels and a spinner.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::task::JoinHandle;

use crate::config::Labels;

const BANNER: &str = r"
██╗   ██╗██╗  ████████╗██████╗  █████╗
██║   ██║██║  ╚══██╔══╝██╔══██╗██╔══██╗
██║   ██║██║     ██║   ██████╔╝███████║
╚██╗ ██╔╝██║     ██║   ██╔══██╗██╔══██║
 ╚████╔╝ ███████╗██║   ██║  ██║██║  ██║
  ╚═══╝  ╚══════╝╚═╝   ╚═╝  ╚═╝╚═╝  ╚═╝
";

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_TICK: Duration = Duration::from_millis(80);

pub fn print_banner() {
    // Terminal title.
    print!("\x1b]0;⚡ Ultra Chat\x07");
    println!("{}", BANNER.bright_magenta().bold());
}

pub fn user_prompt(labels: &Labels) -> String {
    format!("{} >>> ", labels.user).blue().bold().to_string()
}

pub fn assistant_prompt(labels: &Labels) -> String {
    format!("{} >>>", labels.assistant).red().bold().to_string()
}

pub fn title(message: &str) {
    println!("{}\n", message.bold());
}

pub fn success(message: &str) {
    println!("{}", message.green().bold());
}

pub fn notice(message: &str) {
    println!("{}", message.yellow().bold());
}

pub fn error(message: &str) {
    println!("{}", message.red());
}

/// Animated spinner on the current line. Stops and clears the line when
/// dropped or when [`Spinner::stop`] is awaited.
pub struct Spinner {
    stop_flag: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn start(message: impl Into<String>) -> Self {
        let message = message.into();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_flag);

        let task = tokio::spawn(async move {
            let mut frame = 0usize;
            while !flag.load(Ordering::SeqCst) {
                let glyph = SPINNER_FRAMES[frame % SPINNER_FRAMES.len()];
                print!("\r{} {message}", glyph.cyan());
                let _ = std::io::stdout().flush();
                tokio::time::sleep(SPINNER_TICK).await;
                frame += 1;
            }
        });

        Self {
            stop_flag,
            task: Some(task),
        }
    }

    pub async fn stop(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        clear_line();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.stop_flag.store(true, Ordering::SeqCst);
            task.abort();
            clear_line();
        }
    }
}

fn clear_line() {
    print!("\r\x1b[2K");
    let _ = std::io::stdout().flush();
}

/// Spinner demo for `/progress`.
pub async fn progress_demo(duration: Duration) {
    let spinner = Spinner::start("Working...");
    tokio::time::sleep(duration).await;
    spinner.stop().await;
    success("Done!");
}
