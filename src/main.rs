use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use gitcore::commands::plumbing::cat_file::CatFileMode;
use gitcore::commands::plumbing::rev_list::RevListOptions;
use gitcore::commands::plumbing::show_ref::ShowRefOptions;
use gitcore::commands::porcelain::log::LogOptions;
use gitcore::artifacts::objects::object_type::ObjectType;
use gitcore::{CommitDecoration, CommitDisplayFormat, Context, Repository};
use is_terminal::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GITCORE_LOG";

#[derive(Parser)]
#[command(
    name = "gitcore",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "A git-compatible object store",
    long_about = "Reads and writes git repositories: objects (loose and packed), \
    references with their reflogs, the index, and commit history.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "init", about = "Create an empty repository or reinitialize an existing one")]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
        #[arg(long, help = "Create a bare repository")]
        bare: bool,
    },
    #[command(name = "hash-object", about = "Compute an object id and optionally store the object")]
    HashObject {
        #[arg(short, long, help = "Write the object to the object database")]
        write: bool,
        #[arg(short = 't', long = "type", default_value = "blob", help = "Object type")]
        object_type: String,
        #[arg(index = 1)]
        file: PathBuf,
    },
    #[command(
        name = "cat-file",
        about = "Print the type, size or content of an object",
        group(ArgGroup::new("mode").required(true).args(["pretty", "show_type", "size", "exists"]))
    )]
    CatFile {
        #[arg(short = 'p', help = "Pretty-print the object content")]
        pretty: bool,
        #[arg(short = 't', help = "Print the object type")]
        show_type: bool,
        #[arg(short = 's', help = "Print the object size")]
        size: bool,
        #[arg(short = 'e', help = "Exit with zero status if the object exists")]
        exists: bool,
        #[arg(index = 1)]
        object: String,
    },
    #[command(name = "ls-tree", about = "List the contents of a tree object")]
    LsTree {
        #[arg(short = 'r', help = "Recurse into subtrees")]
        recursive: bool,
        #[arg(index = 1)]
        tree: String,
    },
    #[command(name = "ls-files", about = "Show staged paths")]
    LsFiles {
        #[arg(short, long, help = "Show mode, object id and stage")]
        stage: bool,
    },
    #[command(name = "read-tree", about = "Read a tree into the index")]
    ReadTree {
        #[arg(index = 1)]
        tree: String,
    },
    #[command(name = "write-tree", about = "Create a tree object from the index")]
    WriteTree,
    #[command(name = "commit-tree", about = "Create a commit object")]
    CommitTree {
        #[arg(index = 1)]
        tree: String,
        #[arg(short = 'p', help = "Parent commit; may be repeated")]
        parents: Vec<String>,
        #[arg(short, long)]
        message: String,
    },
    #[command(name = "update-ref", about = "Update or delete a reference safely")]
    UpdateRef {
        #[arg(short = 'd', help = "Delete the reference")]
        delete: bool,
        #[arg(short = 'm', default_value = "", help = "Reflog message")]
        message: String,
        #[arg(index = 1)]
        name: String,
        #[arg(index = 2)]
        new_value: Option<String>,
        #[arg(index = 3)]
        old_value: Option<String>,
    },
    #[command(name = "symbolic-ref", about = "Read or modify a symbolic reference")]
    SymbolicRef {
        #[arg(short = 'm', default_value = "", help = "Reflog message")]
        message: String,
        #[arg(index = 1)]
        name: String,
        #[arg(index = 2)]
        target: Option<String>,
    },
    #[command(name = "show-ref", about = "List references with their object ids")]
    ShowRef {
        #[arg(long)]
        heads: bool,
        #[arg(long)]
        tags: bool,
        #[arg(short, long, help = "Also show the peeled target of annotated tags")]
        dereference: bool,
    },
    #[command(name = "pack-refs", about = "Move references into packed-refs")]
    PackRefs,
    #[command(name = "rev-list", about = "List commit ids in reverse chronological order")]
    RevList {
        #[arg(index = 1)]
        revisions: Vec<String>,
        #[arg(long)]
        topo_order: bool,
        #[arg(long)]
        date_order: bool,
        #[arg(long)]
        reverse: bool,
        #[arg(short = 'n', long)]
        max_count: Option<usize>,
        #[arg(long, help = "Start from every reference")]
        all: bool,
    },
    #[command(name = "add", about = "Add file contents to the index")]
    Add {
        #[arg(index = 1, required = true)]
        paths: Vec<String>,
    },
    #[command(name = "commit", about = "Record the staged changes")]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
    },
    #[command(name = "log", about = "Show commit logs")]
    Log {
        #[arg(index = 1)]
        revisions: Vec<String>,
        #[arg(long)]
        oneline: bool,
        #[arg(long)]
        abbrev_commit: bool,
        #[arg(long, value_enum, default_value_t = CommitDisplayFormat::Medium)]
        format: CommitDisplayFormat,
        #[arg(long, value_enum, default_value_t = CommitDecoration::Short)]
        decorate: CommitDecoration,
        #[arg(short = 'n', long)]
        max_count: Option<usize>,
        #[arg(long)]
        topo_order: bool,
        #[arg(long)]
        reverse: bool,
        #[arg(long)]
        all: bool,
    },
    #[command(name = "branch", about = "List, create, rename or delete branches")]
    Branch {
        #[command(subcommand)]
        action: Option<BranchAction>,
    },
    #[command(name = "tag", about = "List, create or delete tags")]
    Tag {
        #[command(subcommand)]
        action: Option<TagAction>,
    },
    #[command(name = "notes", about = "Add, show or remove object notes")]
    Notes {
        #[arg(long = "ref", global = true, help = "Notes reference (default refs/notes/commits)")]
        notes_ref: Option<String>,
        #[command(subcommand)]
        action: NotesAction,
    },
    #[command(name = "reflog", about = "Show the update history of a reference")]
    Reflog {
        #[arg(index = 1)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum BranchAction {
    Create {
        name: String,
        start_point: Option<String>,
        #[arg(short, long)]
        force: bool,
    },
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
    Rename {
        old_name: String,
        new_name: String,
        #[arg(short, long)]
        force: bool,
    },
    List {
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum TagAction {
    Create {
        name: String,
        target: Option<String>,
        #[arg(short, long, help = "Create an annotated tag with this message")]
        message: Option<String>,
        #[arg(short, long)]
        force: bool,
    },
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
    List {
        pattern: Option<String>,
    },
}

#[derive(Subcommand)]
enum NotesAction {
    Add {
        object: Option<String>,
        #[arg(short, long, required = true)]
        message: String,
        #[arg(short, long)]
        force: bool,
    },
    Show {
        object: Option<String>,
    },
    Remove {
        object: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_repository(context: Arc<Context>) -> Result<Repository> {
    let pwd = std::env::current_dir()?;
    Ok(Repository::open(&pwd, context)?)
}

fn main() -> Result<()> {
    init_tracing();
    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let cli = Cli::parse();
    let context = Arc::new(Context::from_env());
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Init { path, bare } => {
            let path = match path {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            Repository::initialize(&mut stdout, &path, bare, context)?;
        }
        Commands::HashObject {
            write,
            object_type,
            file,
        } => {
            let object_type = ObjectType::try_from(object_type.as_str())?;
            open_repository(context)?.hash_object(&mut stdout, &file, object_type, write)?;
        }
        Commands::CatFile {
            pretty,
            show_type,
            size,
            exists: _,
            object,
        } => {
            let mode = match (pretty, show_type, size) {
                (true, _, _) => CatFileMode::Pretty,
                (_, true, _) => CatFileMode::Type,
                (_, _, true) => CatFileMode::Size,
                _ => CatFileMode::Exists,
            };
            if !open_repository(context)?.cat_file(&mut stdout, &object, mode)? {
                std::process::exit(1);
            }
        }
        Commands::LsTree { recursive, tree } => {
            open_repository(context)?.ls_tree(&mut stdout, &tree, recursive)?;
        }
        Commands::LsFiles { stage } => {
            open_repository(context)?.ls_files(&mut stdout, stage)?;
        }
        Commands::ReadTree { tree } => {
            open_repository(context)?.read_tree_into_index(&tree)?;
        }
        Commands::WriteTree => {
            open_repository(context)?.write_tree(&mut stdout)?;
        }
        Commands::CommitTree {
            tree,
            parents,
            message,
        } => {
            open_repository(context)?.commit_tree(&mut stdout, &tree, &parents, &message)?;
        }
        Commands::UpdateRef {
            delete,
            message,
            name,
            new_value,
            old_value,
        } => {
            let repository = open_repository(context)?;
            if delete {
                // with -d the only value given is the expected old one
                repository.delete_ref(&name, new_value.as_deref())?;
            } else {
                let new_value =
                    new_value.ok_or_else(|| anyhow::anyhow!("update-ref needs a new value"))?;
                repository.update_ref(&name, &new_value, old_value.as_deref(), &message)?;
            }
        }
        Commands::SymbolicRef {
            message,
            name,
            target,
        } => {
            open_repository(context)?.symbolic_ref(&mut stdout, &name, target.as_deref(), &message)?;
        }
        Commands::ShowRef {
            heads,
            tags,
            dereference,
        } => {
            let opts = ShowRefOptions {
                heads,
                tags,
                dereference,
            };
            open_repository(context)?.show_ref(&mut stdout, opts)?;
        }
        Commands::PackRefs => {
            open_repository(context)?.pack_refs()?;
        }
        Commands::RevList {
            revisions,
            topo_order,
            date_order,
            reverse,
            max_count,
            all,
        } => {
            let opts = RevListOptions {
                revisions,
                topo_order,
                date_order,
                reverse,
                max_count,
                all,
            };
            open_repository(context)?.rev_list(&mut stdout, &opts)?;
        }
        Commands::Add { paths } => {
            open_repository(context)?.add(&paths)?;
        }
        Commands::Commit { message } => {
            open_repository(context)?.commit(&mut stdout, &message)?;
        }
        Commands::Log {
            revisions,
            oneline,
            abbrev_commit,
            format,
            decorate,
            max_count,
            topo_order,
            reverse,
            all,
        } => {
            let opts = LogOptions {
                oneline,
                abbrev_commit,
                format,
                decorate,
                walk: RevListOptions {
                    revisions,
                    topo_order,
                    reverse,
                    max_count,
                    all,
                    ..RevListOptions::default()
                },
            };
            open_repository(context)?.log(&mut stdout, &opts)?;
        }
        Commands::Branch { action } => {
            let repository = open_repository(context)?;
            match action.unwrap_or(BranchAction::List { verbose: false }) {
                BranchAction::Create {
                    name,
                    start_point,
                    force,
                } => repository.branch(&name, start_point.as_deref(), force)?,
                BranchAction::Delete { names } => repository.branch_delete(&mut stdout, &names)?,
                BranchAction::Rename {
                    old_name,
                    new_name,
                    force,
                } => repository.branch_move(&old_name, &new_name, force)?,
                BranchAction::List { verbose } => repository.list_branches(&mut stdout, verbose)?,
            }
        }
        Commands::Tag { action } => {
            let repository = open_repository(context)?;
            match action.unwrap_or(TagAction::List { pattern: None }) {
                TagAction::Create {
                    name,
                    target,
                    message,
                    force,
                } => repository.tag(&name, target.as_deref(), message.as_deref(), force)?,
                TagAction::Delete { names } => repository.tag_delete(&mut stdout, &names)?,
                TagAction::List { pattern } => repository.list_tags(&mut stdout, pattern.as_deref())?,
            }
        }
        Commands::Notes { notes_ref, action } => {
            let repository = open_repository(context)?;
            let notes_ref = notes_ref.as_deref();
            match action {
                NotesAction::Add { object, message, force } => {
                    repository.notes_add(notes_ref, object.as_deref(), &message, force)?
                }
                NotesAction::Show { object } => repository.notes_show(&mut stdout, notes_ref, object.as_deref())?,
                NotesAction::Remove { object } => repository.notes_remove(notes_ref, object.as_deref())?,
            }
        }
        Commands::Reflog { name } => {
            open_repository(context)?.reflog(&mut stdout, name.as_deref())?;
        }
    }

    Ok(())
}
