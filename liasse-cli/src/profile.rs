use clap::Subcommand;
use colored::Colorize;
use liasse_lib::{
    Field, Profile, ProfileCoordinator, ProfileId, Repository, Result,
    selection::{SelectionMarker, UnknownMarker},
};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List profiles, the selected one is marked with `*`
    List,
    /// Show the selected profile and its paths
    Show,
    /// Select a profile by id, or `default` or `draft`
    Select {
        #[arg(value_parser = parse_target)]
        target: SelectionMarker,
    },
    /// Add an empty profile and select it
    Add { name: String },
    /// Edit the selected paths. Edits are kept in the unsaved draft
    Edit {
        /// Path to the spreadsheet
        #[arg(long)]
        excel: Option<String>,
        /// Path to the working folder
        #[arg(long)]
        folder: Option<String>,
    },
    /// Save the current paths under a new name
    SaveAs { name: String },
    /// Rename the selected profile
    Rename { name: String },
    /// Deactivate the selected profile
    Deactivate,
}

fn parse_target(s: &str) -> std::result::Result<SelectionMarker, UnknownMarker> {
    s.trim().to_uppercase().parse()
}

pub async fn handle(coordinator: &ProfileCoordinator<Repository>, cmd: &Command) -> Result<()> {
    match cmd {
        Command::List => {
            let selected = coordinator.selected().id();
            for profile in coordinator.profiles().iter() {
                print_entry(profile, profile.id() == selected);
            }
        }
        Command::Show => print_selected(coordinator),
        Command::Select { target } => {
            let id = match target {
                SelectionMarker::Default => ProfileId::DEFAULT,
                SelectionMarker::Draft => match coordinator.draft() {
                    Some(draft) => draft.id(),
                    None => {
                        println!("{}", "There are no unsaved changes".yellow());
                        return Ok(());
                    }
                },
                SelectionMarker::Profile(id) => *id,
            };
            coordinator.select(id).await?;
            print_selected(coordinator);
        }
        Command::Add { name } => {
            let id = coordinator.add_profile(name).await?;
            println!("{} {name} ({id})", "Added".green());
        }
        Command::Edit { excel, folder } => {
            if let Some(excel) = excel {
                coordinator.set_excel_path(excel).await?;
            }
            if let Some(folder) = folder {
                coordinator.set_folder_path(folder).await?;
            }

            for field in [Field::ExcelPath, Field::FolderPath] {
                if let Some(err) = coordinator.field_error(field) {
                    println!("{} {err}", "warning:".yellow().bold());
                }
            }
            print_selected(coordinator);
        }
        Command::SaveAs { name } => {
            let id = coordinator.save_as(name).await?;
            println!("{} {name} ({id})", "Saved".green());
        }
        Command::Rename { name } => {
            coordinator.rename_selected(name).await?;
            println!("{} {name}", "Renamed to".green());
        }
        Command::Deactivate => {
            let selected = coordinator.selected();
            coordinator.deactivate_selected().await?;
            println!("{} {}", "Deactivated".green(), selected.name());
        }
    }

    Ok(())
}

fn print_entry(profile: &Profile, selected: bool) {
    let marker = if selected { "*" } else { " " };
    let id = format!("{:>4}", profile.id().get()).dimmed();
    let name = if profile.is_draft() {
        format!("{} (unsaved)", profile.name()).as_str().italic()
    } else if selected {
        profile.name().as_str().bold()
    } else {
        profile.name().as_str().normal()
    };

    println!("{marker} {id} {name}");
}

fn print_selected(coordinator: &ProfileCoordinator<Repository>) {
    let selected = coordinator.selected();
    let excel = coordinator.field_text(Field::ExcelPath);
    let folder = coordinator.field_text(Field::FolderPath);

    print_entry(&selected, true);
    println!("    {} {}", "excel: ".dimmed(), or_dash(&excel));
    println!("    {} {}", "folder:".dimmed(), or_dash(&folder));
}

fn or_dash(text: &str) -> &str {
    if text.trim().is_empty() { "-" } else { text }
}
