use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use fsq_core::{
    queue::QueueDir,
    status,
    submit::submit,
    worker::{run_worker, WorkerConfig},
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "fsq",
    version,
    about = "Filesystem-backed task queue for experiment orchestration",
    long_about = "fsq queues shell commands as files and runs them under supervising workers.\n\
                  All state lives in the queue directory; rename is the only lock."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a command and print its completion witness
    Submit {
        /// Queue root directory
        queue_dir: PathBuf,

        /// Shell command to run (may be multiline)
        cmd: String,

        /// Precondition: shell expression that must exit 0 before the command runs
        #[arg(long, default_value = "true")]
        chk: String,
    },

    /// Run the supervision loop: claim, check, execute, report
    Worker {
        /// Queue root directory
        queue_dir: PathBuf,

        /// Keep polling when the queue is empty instead of exiting
        #[arg(long)]
        persist: bool,

        /// Exit after the first task reaches a terminal state
        #[arg(long)]
        one_task: bool,

        /// Seconds between directory polls
        #[arg(long, default_value_t = 1)]
        poll_interval: u64,
    },

    /// Create the six state directories
    Init {
        /// Queue root directory
        queue_dir: PathBuf,
    },

    /// List tasks per state directory
    Status {
        /// Queue root directory
        queue_dir: PathBuf,

        /// Emit the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a task file and its current state
    Show {
        /// Queue root directory
        queue_dir: PathBuf,
        /// Task id
        task_id: String,
    },

    /// Suspend a running task (active -> paused; its worker SIGSTOPs the tree)
    Pause {
        /// Queue root directory
        queue_dir: PathBuf,
        /// Task id
        task_id: String,
    },

    /// Resume a paused task (paused -> active; its worker SIGCONTs the tree)
    Resume {
        /// Queue root directory
        queue_dir: PathBuf,
        /// Task id
        task_id: String,
    },

    /// Delete a running or paused task; its worker kills the process tree
    Cancel {
        /// Queue root directory
        queue_dir: PathBuf,
        /// Task id
        task_id: String,
    },

    /// Move a failed task back to queued
    Retry {
        /// Queue root directory
        queue_dir: PathBuf,
        /// Task id
        task_id: String,
    },
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("fsq: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Submit { queue_dir, cmd, chk } => {
            let queue = QueueDir::new(queue_dir);
            let submission = submit(&queue, &cmd, Some(&chk))?;
            println!("{}", submission.witness);
            Ok(())
        }

        Commands::Worker {
            queue_dir,
            persist,
            one_task,
            poll_interval,
        } => {
            let mut config = WorkerConfig::new(queue_dir);
            config.persist = persist;
            config.one_task = one_task;
            config.poll_interval = Duration::from_secs(poll_interval);
            run_worker(&config)
        }

        Commands::Init { queue_dir } => {
            let queue = QueueDir::new(queue_dir);
            queue.init()?;
            println!("Initialized: {}", queue.root().display());
            Ok(())
        }

        Commands::Status { queue_dir, json } => {
            let queue = QueueDir::new(queue_dir);
            if json {
                println!("{}", status::status_json(&queue)?);
                Ok(())
            } else {
                status::print_status(&queue)
            }
        }

        Commands::Show { queue_dir, task_id } => {
            status::show_task(&QueueDir::new(queue_dir), &task_id)
        }

        Commands::Pause { queue_dir, task_id } => {
            let queue = QueueDir::new(queue_dir);
            if !queue.pause(&task_id)? {
                bail!("task '{task_id}' is not in active/");
            }
            println!("Paused: {task_id}");
            Ok(())
        }

        Commands::Resume { queue_dir, task_id } => {
            let queue = QueueDir::new(queue_dir);
            if !queue.resume(&task_id)? {
                bail!("task '{task_id}' is not in paused/");
            }
            println!("Resumed: {task_id}");
            Ok(())
        }

        Commands::Cancel { queue_dir, task_id } => {
            let queue = QueueDir::new(queue_dir);
            if !queue.cancel(&task_id)? {
                bail!("task '{task_id}' is not in active/ or paused/");
            }
            println!("Cancelled: {task_id}");
            Ok(())
        }

        Commands::Retry { queue_dir, task_id } => {
            let queue = QueueDir::new(queue_dir);
            if !queue.retry(&task_id)? {
                bail!("task '{task_id}' is not in failed/");
            }
            println!("Retrying: {task_id} (moved to queued)");
            Ok(())
        }
    }
}
