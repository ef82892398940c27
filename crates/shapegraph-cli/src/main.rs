//! shapegraph CLI - convert scene documents into tessellated scene trees.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use shapegraph::{convert, ConvertOptions, InstanceCache, Labels};
use shapegraph_ir::Document;
use shapegraph_kernel::{Rgba, ShapeClassifier, VariantTag};
use shapegraph_kernel_memory::{MemoryKernel, MemoryObject};
use shapegraph_math::BoundingBox;

#[derive(Parser)]
#[command(name = "shapegraph")]
#[command(about = "Normalize and tessellate CAD scene documents", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a scene document and print a summary
    Convert(ConvertArgs),
    /// Print the classified outline of a scene document without tessellating
    Info {
        /// Scene document (.json)
        file: PathBuf,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// Scene document (.json)
    input: PathBuf,
    /// Write the scene tree and meshes as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Conversion options (.toml); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Relative linear deviation
    #[arg(long)]
    deviation: Option<f64>,
    /// Angular tolerance in radians
    #[arg(long)]
    angular_tolerance: Option<f64>,
    /// Do not compute face edges
    #[arg(long)]
    no_edges: bool,
    /// Skip unsupported objects instead of failing
    #[arg(long)]
    permissive: bool,
    /// Outline the shapes each object was derived from
    #[arg(long)]
    show_parent: bool,
    /// Number of tessellation threads
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert(args) => run_convert(&args)?,
        Commands::Info { file } => show_info(&file)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(args: &ConvertArgs) -> Result<ConvertOptions> {
    let mut options = match &args.config {
        Some(path) => ConvertOptions::from_toml_file(path)
            .with_context(|| format!("reading options from {}", path.display()))?,
        None => ConvertOptions::default(),
    };
    if let Some(deviation) = args.deviation {
        options.deviation = deviation;
    }
    if let Some(angular_tolerance) = args.angular_tolerance {
        options.angular_tolerance = angular_tolerance;
    }
    if args.no_edges {
        options.render_edges = false;
    }
    if args.permissive {
        options.strict = false;
    }
    if args.show_parent {
        options.show_parent = true;
    }
    if args.threads.is_some() {
        options.threads = args.threads;
    }
    Ok(options)
}

fn load_document(path: &Path) -> Result<Document> {
    Document::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let options = load_options(args)?;
    let scene = load_document(&args.input)?.resolve()?;
    let labels = Labels {
        names: scene.names,
        colors: scene.colors,
        alphas: scene.alphas,
    };

    let kernel = MemoryKernel::new();
    let mut cache = InstanceCache::new();
    let conversion = convert(&kernel, &kernel, &scene.objects, &labels, &options, &mut cache)?;
    let stats = conversion.stats();

    println!("Converted {}", args.input.display());
    println!("  Groups: {}", stats.groups);
    println!("  Shape nodes: {}", stats.shapes());
    println!("  Distinct instances: {}", cache.len());
    println!("  Triangles: {}", conversion.report.triangles);
    println!(
        "  Tessellation: {:.1} ms",
        conversion.report.elapsed.as_secs_f64() * 1000.0
    );
    match conversion.bounding_box() {
        Some(bb) => println!("  Bounds: {}", describe_bounds(&bb)),
        None => println!("  Bounds: none"),
    }
    println!("  Diagnostics: {}", conversion.diagnostics.len());
    for diagnostic in &conversion.diagnostics {
        println!("    {}: {}", diagnostic.path, diagnostic.error);
    }

    if let Some(output) = &args.output {
        let json =
            serde_json::to_string_pretty(&conversion.output(cache.mesh_table(), options.deviation))?;
        fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
        println!("Wrote {}", output.display());
    }

    Ok(())
}

fn show_info(file: &Path) -> Result<()> {
    let doc = load_document(file)?;
    let scene = doc.resolve()?;
    let kernel = MemoryKernel::new();

    println!("shapegraph document: {}", file.display());
    println!("  Version: {}", doc.version);
    println!("  Library shapes: {}", doc.library.len());
    println!("  Scene objects: {}", scene.objects.len());

    if !scene.objects.is_empty() {
        println!("\nScene:");
        for (i, obj) in scene.objects.iter().enumerate() {
            let name = scene
                .names
                .as_ref()
                .and_then(|names| names.get(i).cloned().flatten());
            print_outline(&kernel, obj, name, 1);
        }
    }

    Ok(())
}

fn describe_bounds(bb: &BoundingBox) -> String {
    let c = bb.center();
    format!(
        "[{:.3}, {:.3}, {:.3}] .. [{:.3}, {:.3}, {:.3}], center [{:.3}, {:.3}, {:.3}]",
        bb.min.x, bb.min.y, bb.min.z, bb.max.x, bb.max.y, bb.max.z, c.x, c.y, c.z
    )
}

fn outline_entry(
    name: Option<&str>,
    type_name: &str,
    tag: VariantTag,
    color: Option<Rgba>,
) -> String {
    let mut line = match name {
        Some(name) => format!("{name}: {type_name} ({tag:?})"),
        None => format!("{type_name} ({tag:?})"),
    };
    if let Some(color) = color {
        line.push(' ');
        line.push_str(&color.to_hex());
    }
    line
}

fn print_outline(kernel: &MemoryKernel, obj: &MemoryObject, key: Option<String>, depth: usize) {
    let tag = kernel.classify(obj);
    let name = key.or_else(|| kernel.label(obj));
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{}",
        outline_entry(name.as_deref(), &kernel.type_name(obj), tag, kernel.color(obj))
    );
    let parents = kernel.parents(obj);
    if !parents.is_empty() {
        println!("{indent}  ({} parent shapes)", parents.len());
    }

    match tag {
        VariantTag::Sequence | VariantTag::Mapping => {
            for child in kernel.children(obj) {
                print_outline(kernel, child.object, child.key, depth + 1);
            }
        }
        VariantTag::Assembly => {
            if let Some(view) = kernel.assembly(obj) {
                if view.shape.is_some() {
                    println!("{indent}  (own shape)");
                }
                for (mate, _) in &view.mates {
                    println!("{indent}  mate {mate}");
                }
                for part in view.parts {
                    print_outline(kernel, part, None, depth + 1);
                }
            }
        }
        _ => {}
    }
}
