use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use webstack_cloud::{ActionType, Progress, ProgressEvent};

/// Terminal progress for a driver run
///
/// Engine output lines replace the spinner message; resource steps are
/// printed above the spinner so they stay visible.
pub struct SpinnerProgress {
    progress_bar: ProgressBar,
}

impl SpinnerProgress {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb.set_message(message.to_string());

        Self { progress_bar: pb }
    }

    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

impl Progress for SpinnerProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Output(line) => {
                tracing::debug!("{}", line);
                self.progress_bar.set_message(line.trim().to_string());
            }
            ProgressEvent::Resource {
                action,
                resource_type,
                resource_id,
            } => {
                let symbol = match action {
                    ActionType::Create => "+".green(),
                    ActionType::Update => "~".yellow(),
                    ActionType::Delete => "-".red(),
                    ActionType::NoOp => " ".normal(),
                };
                self.progress_bar.println(format!(
                    "  {} {} {}",
                    symbol,
                    resource_id.bold(),
                    resource_type.dimmed()
                ));
            }
        }
    }
}
