use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use phrasedex::utils::{
    ensure_store_directory, get_store_path, parse_realm, parse_relation, parse_relation_pair,
    parse_tags,
};
use phrasedex::{
    Citation, IndexConfig, IndexError, KeyPair, Lookup, NoteData, NoteRecord, PhraseIndex,
    RealmDraft, RealmRef, SEE_ALSO, Sorter, SqliteStore, TrieOptions, distance, trie,
};
use tracing_subscriber::EnvFilter;

/// phrasedex - realm-partitioned phrase index
#[derive(Parser)]
#[command(name = "phrasedex")]
#[command(about = "Index, relate and fuzzy-match short phrases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Add a phrase, or merge the given fields into it if the realm already holds it
    Add(AddCommand),
    /// Look a phrase up, in one realm or in all of them
    Find(FindCommand),
    /// Delete a phrase and every edge pointing at it
    Delete(DeleteCommand),
    /// Remove one relation edge and its reverse
    Unlink(UnlinkCommand),
    /// List realms
    Realms,
    /// Create or update a realm
    SaveRealm(SaveRealmCommand),
    /// Remove a realm and all of its phrases
    RemoveRealm(RemoveRealmCommand),
    /// List every tag in use
    Tags,
    /// Rank a realm's phrases by edit distance
    Similar(SimilarCommand),
    /// Compile words into a single matcher pattern
    Trie(TrieCommand),
    /// Weighted edit distance between two words
    Distance(DistanceCommand),
    /// Free store capacity in bytes
    Memfree,
}

#[derive(Parser)]
struct AddCommand {
    #[arg(value_name = "PHRASE")]
    phrase: String,

    /// Realm name or pk (default realm when omitted)
    #[arg(short, long, value_name = "REALM")]
    realm: Option<String>,

    /// Comma-separated tags
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,

    /// Relation edge, LABEL=REALM:PHRASE (repeatable)
    #[arg(long = "relation", value_name = "EDGE", value_parser = parse_relation)]
    relations: Vec<(String, KeyPair)>,

    /// Shorthand for --relation "see also=REALM:PHRASE" (repeatable)
    #[arg(long = "see-also", value_name = "KEY")]
    see_also: Vec<KeyPair>,

    /// Citation text (repeatable)
    #[arg(short, long = "cite", value_name = "TEXT")]
    citations: Vec<String>,

    #[arg(long)]
    star: bool,

    #[arg(short, long, value_name = "TEXT")]
    annotation: Option<String>,

    /// Replace the stored record instead of merging into it; tags, edges
    /// (and their reverses on linked notes), citations and annotation not
    /// given again are dropped
    #[arg(long)]
    replace: bool,
}

#[derive(Parser)]
struct FindCommand {
    #[arg(value_name = "PHRASE")]
    phrase: String,

    #[arg(short, long, value_name = "REALM")]
    realm: Option<String>,
}

#[derive(Parser)]
struct DeleteCommand {
    #[arg(value_name = "PHRASE")]
    phrase: String,

    #[arg(short, long, value_name = "REALM")]
    realm: Option<String>,
}

#[derive(Parser)]
struct UnlinkCommand {
    #[arg(value_name = "PHRASE")]
    phrase: String,

    #[arg(value_name = "RELATION")]
    relation: String,

    /// Target key, REALM:PHRASE
    #[arg(value_name = "KEY")]
    target: KeyPair,

    #[arg(short, long, value_name = "REALM")]
    realm: Option<String>,
}

#[derive(Parser)]
struct SaveRealmCommand {
    #[arg(value_name = "NAME")]
    name: String,

    #[arg(short, long, value_name = "TEXT", default_value = "")]
    description: String,

    /// Normalizer name ("", "exact" or "loose")
    #[arg(short, long, value_name = "NAME")]
    normalizer: Option<String>,

    /// Relation pair, LABEL or LABEL=REVERSE (repeatable)
    #[arg(long = "relation", value_name = "PAIR", value_parser = parse_relation_pair)]
    relations: Vec<(String, String)>,
}

#[derive(Parser)]
struct RemoveRealmCommand {
    #[arg(value_name = "REALM")]
    realm: String,
}

#[derive(Parser)]
struct SimilarCommand {
    #[arg(value_name = "PHRASE")]
    phrase: String,

    #[arg(short, long, value_name = "REALM")]
    realm: Option<String>,

    /// Sorter name (default sorter when omitted or unknown)
    #[arg(short, long, value_name = "NAME", default_value = "")]
    sorter: String,

    #[arg(short, long, default_value_t = 10)]
    limit: usize,
}

#[derive(Parser)]
struct TrieCommand {
    #[arg(value_name = "WORDS", required = true)]
    words: Vec<String>,

    /// Match inside words too
    #[arg(long)]
    no_boundaries: bool,

    /// Print the matches found in this text instead of the pattern
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,
}

#[derive(Parser)]
struct DistanceCommand {
    a: String,
    b: String,

    #[arg(long, default_value_t = 0)]
    prefix: usize,

    #[arg(long, default_value_t = 0)]
    suffix: usize,

    #[arg(long, default_value = "")]
    insertables: String,

    /// Group of mutually similar characters (repeatable)
    #[arg(long = "similar", value_name = "CHARS")]
    similars: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PHRASEDEX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// User errors are invalid input; everything else (store, I/O, corrupt
/// state) is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<IndexError>().is_some_and(IndexError::is_user_error))
}

async fn run(command: Commands) -> Result<()> {
    // Commands that never touch the store.
    match command {
        Commands::Trie(cmd) => return execute_trie(&cmd),
        Commands::Distance(cmd) => {
            execute_distance(&cmd);
            return Ok(());
        }
        command => {
            let index = open_index().await?;
            execute(&index, command).await
        }
    }
}

async fn open_index() -> Result<PhraseIndex<SqliteStore>> {
    let config = IndexConfig::from_env();
    let store_path = get_store_path(&config)?;
    ensure_store_directory(&store_path)?;

    let store = SqliteStore::open(&store_path)
        .with_context(|| format!("Failed to open store: {}", store_path.display()))?;
    PhraseIndex::open(store, config)
        .await
        .context("Failed to load phrase index")
}

/// Runs a store-backed command against `index`.
///
/// Separated from `run` so tests can use an in-memory store.
async fn execute<S: phrasedex::KeyValueStore>(index: &PhraseIndex<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Add(cmd) => {
            let key = index.add(&cmd.phrase, build_note_data(index, &cmd).await?).await?;
            println!("Saved {} ({key})", cmd.phrase.trim());
        }
        Commands::Find(cmd) => {
            let realm = cmd.realm.as_deref().map(parse_realm);
            match index.find(&cmd.phrase, realm).await? {
                Lookup::Found(record) => print_record(&record),
                Lookup::NotFound => println!("Not found: {}", cmd.phrase.trim()),
                Lookup::Ambiguous(realms) => {
                    println!("Found in {} realms:", realms.len());
                    for realm in realms {
                        println!("  {} {}", realm.pk, display_realm_name(&realm.name));
                    }
                }
            }
        }
        Commands::Delete(cmd) => {
            if index.delete(&cmd.phrase, realm_arg(cmd.realm.as_deref())).await? {
                println!("Deleted {}", cmd.phrase.trim());
            } else {
                println!("Not found: {}", cmd.phrase.trim());
            }
        }
        Commands::Unlink(cmd) => {
            let realm = realm_arg(cmd.realm.as_deref());
            if index
                .delete_relation(&cmd.phrase, realm, &cmd.relation, cmd.target)
                .await?
            {
                println!("Unlinked {} -{}-> {}", cmd.phrase.trim(), cmd.relation, cmd.target);
            } else {
                println!("No such relation");
            }
        }
        Commands::Realms => {
            for realm in index.realms().await {
                let labels = realm.info.labels().join(", ");
                println!(
                    "{}\t{}\tnormalizer={:?}\trelations=[{labels}]\t{}",
                    realm.pk(),
                    display_realm_name(&realm.name),
                    realm.info.normalizer,
                    realm.info.description
                );
            }
        }
        Commands::SaveRealm(cmd) => {
            let mut draft = RealmDraft::new(&cmd.name).description(&cmd.description);
            if let Some(normalizer) = &cmd.normalizer {
                draft = draft.normalizer(normalizer);
            }
            for (label, reverse) in &cmd.relations {
                draft = draft.relation(label, reverse);
            }
            let pk = index.save_realm(draft).await?;
            println!("Saved realm {} ({pk})", cmd.name.trim());
        }
        Commands::RemoveRealm(cmd) => {
            let removed = index.remove_realm(parse_realm(&cmd.realm)).await?;
            println!("Removed realm {} and {removed} phrase(s)", cmd.realm.trim());
        }
        Commands::Tags => {
            for tag in index.tags().await {
                println!("{tag}");
            }
        }
        Commands::Similar(cmd) => {
            let realm = realm_arg(cmd.realm.as_deref());
            for found in index
                .find_similar(&cmd.phrase, realm, &cmd.sorter, cmd.limit)
                .await?
            {
                println!("{:>6.2}  {}  {}", found.distance, found.key, found.phrase);
            }
        }
        Commands::Memfree => {
            println!("{}", index.memfree().await?);
        }
        Commands::Trie(cmd) => execute_trie(&cmd)?,
        Commands::Distance(cmd) => execute_distance(&cmd),
    }
    Ok(())
}

async fn build_note_data<S: phrasedex::KeyValueStore>(
    index: &PhraseIndex<S>,
    cmd: &AddCommand,
) -> Result<NoteData> {
    let realm = realm_arg(cmd.realm.as_deref());

    let mut data = NoteData::new(realm.clone());
    if !cmd.replace
        && let Lookup::Found(existing) = index.find(&cmd.phrase, Some(realm)).await?
    {
        data = NoteData::from_record(&existing);
    }

    for tag in cmd.tags.as_deref().map(parse_tags).unwrap_or_default() {
        data = data.tag(tag);
    }
    for (label, target) in &cmd.relations {
        data = data.relation(label, *target);
    }
    for target in &cmd.see_also {
        data = data.relation(SEE_ALSO, *target);
    }
    for text in &cmd.citations {
        data = data.citation(Citation::new(text.trim()));
    }
    if cmd.star {
        data = data.starred(true);
    }
    if let Some(annotation) = &cmd.annotation {
        data = data.annotation(annotation.trim());
    }
    Ok(data)
}

fn execute_trie(cmd: &TrieCommand) -> Result<()> {
    let options = TrieOptions {
        boundaries: !cmd.no_boundaries,
    };
    let compiled = trie::compile(&cmd.words, options).context("Failed to compile matcher")?;
    match &cmd.text {
        Some(text) => {
            for range in compiled.find_iter(text) {
                println!("{}..{}\t{}", range.start, range.end, &text[range.clone()]);
            }
        }
        None => println!("{}", compiled.pattern()),
    }
    Ok(())
}

fn execute_distance(cmd: &DistanceCommand) {
    let mut sorter = Sorter::default_sorter()
        .prefix(cmd.prefix)
        .suffix(cmd.suffix)
        .insertables(cmd.insertables.as_str());
    for group in &cmd.similars {
        sorter = sorter.similar(group.as_str());
    }
    println!("{}", distance::distance(&sorter, &cmd.a, &cmd.b));
}

fn realm_arg(realm: Option<&str>) -> RealmRef {
    realm.map(parse_realm).unwrap_or_default()
}

fn display_realm_name(name: &str) -> &str {
    if name.is_empty() { "(default)" } else { name }
}

fn print_record(record: &NoteRecord) {
    let star = if record.starred { " *" } else { "" };
    println!("{} ({}){star}", record.phrase, record.key);
    if !record.tags.is_empty() {
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        println!("  tags: {}", tags.join(", "));
    }
    for label in record.relations.labels() {
        let targets: Vec<String> = record
            .relations
            .get(label)
            .iter()
            .map(KeyPair::to_string)
            .collect();
        println!("  {label}: {}", targets.join(", "));
    }
    for citation in &record.citations {
        println!("  > {}", citation.text);
    }
    if let Some(annotation) = &record.annotation {
        println!("  note: {annotation}");
    }
}
