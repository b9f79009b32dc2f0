mod assets;
mod codec;
mod config;
mod error;
mod export;
mod model;
mod render;
mod session;
mod tax;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use inquire::validator::Validation;
use inquire::{Confirm, CustomType, Select, Text};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::assets::{HttpFetcher, ImageCache};
use crate::config::{load_settings, setup_config_wizard, AppSettings};
use crate::error::ExportError;
use crate::export::{export_or_notify, or_notify, Exporter, TypstPrinter};
use crate::model::{is_valid_amount, BankDetails, Block, Document, DocumentType, Party, PricingMode, TaxSplit};
use crate::render::{preview, Renderer};
use crate::session::{LatestLink, Session};

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "gst-invoice")]
#[command(version, about = "GST invoices that live in a link")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new invoice interactively
    New,
    /// Preview the invoice behind a share link
    Show {
        /// Share link (or just its query string)
        link: String,
    },
    /// Edit the invoice behind a share link and print the new link
    Edit {
        /// Share link (or just its query string)
        link: String,
        #[command(flatten)]
        edits: EditArgs,
    },
    /// Print the share link and copy it to the clipboard
    Share {
        /// Share link (or just its query string)
        link: String,
    },
    /// Export the invoice as a one-page A4 PDF
    Export {
        /// Share link (or just its query string)
        link: String,
        /// Output folder (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Reset all fields to default and print the bare link
    Reset,
    /// Configure base URL, asset and output folders
    Config,
}

#[derive(Args, Default)]
struct EditArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    invoice_no: Option<String>,
    /// Logo alias (creo, little, artangle90, storeeva), path or URL; "" for none
    #[arg(long)]
    logo: Option<String>,
    #[arg(long = "type", value_enum)]
    doc_type: Option<DocumentType>,
    #[arg(long, value_enum)]
    pricing: Option<PricingMode>,
    #[arg(long, value_enum)]
    split: Option<TaxSplit>,

    #[arg(long)]
    billed_to_name: Option<String>,
    /// Use '\n' for new lines
    #[arg(long)]
    billed_to_address: Option<String>,
    #[arg(long)]
    billed_to_gst: Option<String>,
    #[arg(long)]
    from_name: Option<String>,
    /// Use '\n' for new lines
    #[arg(long)]
    from_address: Option<String>,
    #[arg(long)]
    from_gst: Option<String>,

    #[arg(long)]
    bank_account_name: Option<String>,
    #[arg(long)]
    bank_name: Option<String>,
    #[arg(long)]
    bank_account_no: Option<String>,
    #[arg(long)]
    bank_ifsc: Option<String>,
    #[arg(long)]
    bank_account_type: Option<String>,

    #[arg(long)]
    payment: Option<String>,
    #[arg(long)]
    udyam: Option<String>,

    /// Append an item with this description
    #[arg(long)]
    add_item: Option<String>,
    #[arg(long, requires = "add_item", default_value_t = 0.0, value_parser = parse_amount)]
    value: f64,
    #[arg(long, requires = "add_item", default_value = "")]
    hsn: String,
    #[arg(long, requires = "add_item", default_value_t = 18.0, value_parser = parse_amount)]
    rate: f64,
    /// Remove the item with this id (see `show`)
    #[arg(long)]
    remove_item: Vec<String>,

    #[arg(long, value_enum)]
    hide: Vec<Block>,
    #[arg(long, value_enum)]
    show: Vec<Block>,
}

// ==========================================
// Main Function
// ==========================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gst_invoice=info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = load_settings();

    match command {
        Commands::New => new_wizard(&settings)?,
        Commands::Show { link } => {
            if codec::decode_link(&link).is_none() {
                println!("ℹ️  Link carries no invoice, showing the default one");
            }
            let session = open_session(&settings, &link)?;
            println!("{}", preview(session.document()));
            let hidden: Vec<String> = Block::value_variants()
                .iter()
                .filter(|b| !session.document().visibility.get(**b))
                .filter_map(|b| b.to_possible_value().map(|v| v.get_name().to_string()))
                .collect();
            if !hidden.is_empty() {
                println!("🙈 Hidden: {}", hidden.join(", "));
            }
        }
        Commands::Edit { link, edits } => {
            let mut session = open_session(&settings, &link)?;
            apply_edits(&mut session, edits);
            let link = session.sink().link.clone().unwrap_or_else(|| session.share_link());
            println!("{link}");
        }
        Commands::Share { link } => {
            let session = open_session(&settings, &link)?;
            share(&session.share_link());
        }
        Commands::Export { link, output } => {
            let session = open_session(&settings, &link)?;
            let out_dir = output.unwrap_or_else(|| settings.output_path());
            export_pdf(&settings, session.document(), &out_dir);
        }
        Commands::Reset => {
            let confirmed = Confirm::new("Are you sure you want to reset all fields to default?")
                .with_default(false)
                .prompt()?;
            if confirmed {
                let mut session = Session::open(&settings.base_url, None, LatestLink::default())?;
                session.reset();
                let link = match session.into_sink().link {
                    Some(link) => link,
                    None => codec::bare_link(&settings.base_url)?,
                };
                println!("{link}");
            } else {
                println!("Cancelled");
            }
        }
        Commands::Config => {
            setup_config_wizard()?;
        }
    }
    Ok(())
}

fn open_session(settings: &AppSettings, link: &str) -> Result<Session<LatestLink>> {
    Session::open(&settings.base_url, Some(link), LatestLink::default())
        .with_context(|| format!("cannot open link {link}"))
}

// ==========================================
// 1. Editing
// ==========================================

/// Item values and rates: finite numbers, zero or more.
fn parse_amount(raw: &str) -> Result<f64, String> {
    let amount: f64 = raw.trim().parse().map_err(|_| format!("`{raw}` is not a number"))?;
    if is_valid_amount(amount) {
        Ok(amount)
    } else {
        Err(format!("`{raw}` must be a finite number, zero or more"))
    }
}

fn amount_validator(amount: &f64) -> Result<Validation, inquire::CustomUserError> {
    if is_valid_amount(*amount) {
        Ok(Validation::Valid)
    } else {
        Ok(Validation::Invalid("Please type a number, zero or more".into()))
    }
}

fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

fn resolve_logo(input: &str) -> String {
    codec::logo_for_alias(input).unwrap_or(input).to_string()
}

fn apply_edits(session: &mut Session<LatestLink>, edits: EditArgs) {
    // the type switch rewrites the title, so it goes before an explicit title
    if let Some(doc_type) = edits.doc_type {
        session.apply(|d| d.with_document_type(doc_type));
    }
    if let Some(title) = edits.title {
        session.apply(|d| d.with_title(title));
    }
    if let Some(date) = edits.date {
        session.apply(|d| d.with_date(date));
    }
    if let Some(invoice_no) = edits.invoice_no {
        session.apply(|d| d.with_invoice_no(invoice_no));
    }
    if let Some(logo) = edits.logo {
        session.apply(|d| d.with_logo_url(resolve_logo(&logo)));
    }
    if let Some(mode) = edits.pricing {
        session.apply(|d| d.with_pricing_mode(mode));
    }
    if let Some(split) = edits.split {
        session.apply(|d| d.with_tax_split(split));
    }

    if edits.billed_to_name.is_some() || edits.billed_to_address.is_some() || edits.billed_to_gst.is_some() {
        session.apply(|d| {
            let current = &d.billed_to;
            d.with_billed_to(Party {
                name: edits.billed_to_name.unwrap_or_else(|| current.name.clone()),
                address: edits
                    .billed_to_address
                    .map(|a| unescape_newlines(&a))
                    .unwrap_or_else(|| current.address.clone()),
                tax_id: edits.billed_to_gst.unwrap_or_else(|| current.tax_id.clone()),
            })
        });
    }
    if edits.from_name.is_some() || edits.from_address.is_some() || edits.from_gst.is_some() {
        session.apply(|d| {
            let current = &d.from;
            d.with_from(Party {
                name: edits.from_name.unwrap_or_else(|| current.name.clone()),
                address: edits
                    .from_address
                    .map(|a| unescape_newlines(&a))
                    .unwrap_or_else(|| current.address.clone()),
                tax_id: edits.from_gst.unwrap_or_else(|| current.tax_id.clone()),
            })
        });
    }

    let bank_edits = [
        &edits.bank_account_name,
        &edits.bank_name,
        &edits.bank_account_no,
        &edits.bank_ifsc,
        &edits.bank_account_type,
    ];
    if bank_edits.iter().any(|e| e.is_some()) {
        session.apply(|d| {
            let current = &d.bank;
            d.with_bank(BankDetails {
                account_name: edits.bank_account_name.unwrap_or_else(|| current.account_name.clone()),
                bank_name: edits.bank_name.unwrap_or_else(|| current.bank_name.clone()),
                account_no: edits.bank_account_no.unwrap_or_else(|| current.account_no.clone()),
                ifsc: edits.bank_ifsc.unwrap_or_else(|| current.ifsc.clone()),
                account_type: edits.bank_account_type.unwrap_or_else(|| current.account_type.clone()),
            })
        });
    }

    if let Some(payment) = edits.payment {
        session.apply(|d| d.with_payment_note(payment));
    }
    if let Some(udyam) = edits.udyam {
        session.apply(|d| d.with_registration_id(udyam));
    }

    for id in edits.remove_item {
        if session.document().item(&id).is_none() {
            println!("⚠️  No item with id {id}");
            continue;
        }
        session.apply(|d| d.without_item(&id));
    }
    if let Some(description) = edits.add_item {
        let (value, hsn, rate) = (edits.value, edits.hsn, edits.rate);
        session.apply(|d| {
            let (next, id) = d.with_new_item();
            match next.item(&id).cloned() {
                Some(mut item) => {
                    item.description = description;
                    item.value = value;
                    item.hsn_code = hsn;
                    item.tax_rate_percent = rate;
                    next.with_item(item)
                }
                None => next,
            }
        });
    }

    for block in edits.hide {
        session.apply(|d| d.with_visibility(block, false));
    }
    for block in edits.show {
        session.apply(|d| d.with_visibility(block, true));
    }
}

// ==========================================
// 2. New Invoice Wizard
// ==========================================

fn new_wizard(settings: &AppSettings) -> Result<()> {
    let mut session = Session::open(&settings.base_url, None, LatestLink::default())?;
    println!("\n--- Creating New Invoice ---");

    let doc_type = Select::new("Invoice Type:", vec!["PROFORMA INVOICE", "TAX INVOICE"]).prompt()?;
    let doc_type = if doc_type == "TAX INVOICE" { DocumentType::Tax } else { DocumentType::Proforma };
    session.apply(|d| d.with_document_type(doc_type));

    if doc_type == DocumentType::Tax {
        let invoice_no = Text::new("Invoice No:").with_default(&session.document().invoice_no).prompt()?;
        session.apply(|d| d.with_invoice_no(invoice_no));
    }

    let date = Text::new("Invoice Date:").with_default(&session.document().date).prompt()?;
    session.apply(|d| d.with_date(date));

    let mut logo_options: Vec<String> = codec::logo_aliases().map(|(alias, _)| alias.to_string()).collect();
    logo_options.push("Custom URL".to_string());
    logo_options.push("No Logo".to_string());
    let logo = match Select::new("Logo:", logo_options).prompt()?.as_str() {
        "Custom URL" => Text::new("Logo URL:").prompt()?,
        "No Logo" => String::new(),
        alias => resolve_logo(alias),
    };
    session.apply(|d| d.with_logo_url(logo));

    println!("\n--- Billed To ---");
    let current = session.document().billed_to.clone();
    let billed_to = Party {
        name: Text::new("Name:").with_default(&current.name).prompt()?,
        address: unescape_newlines(
            &Text::new("Address (use '\\n' for new lines):")
                .with_default(&current.address.replace('\n', "\\n"))
                .prompt()?,
        ),
        tax_id: Text::new("GSTIN:").with_default(&current.tax_id).prompt()?,
    };
    session.apply(|d| d.with_billed_to(billed_to));

    let pricing = Select::new("Item values are:", vec!["Exclusive of GST", "Inclusive of GST"]).prompt()?;
    let pricing = if pricing.starts_with("Inclusive") { PricingMode::Inclusive } else { PricingMode::Exclusive };
    session.apply(|d| d.with_pricing_mode(pricing));

    let split = Select::new("Tax shown as:", vec!["CGST + SGST", "IGST"]).prompt()?;
    let split = if split == "IGST" { TaxSplit::Single } else { TaxSplit::Split };
    session.apply(|d| d.with_tax_split(split));

    let keep_sample = Confirm::new("Keep the sample item?").with_default(false).prompt()?;
    if !keep_sample {
        session.apply(|d| Document { items: Vec::new(), ..d.clone() });
    }
    enter_invoice_items(&mut session)?;

    println!("\n{}", preview(session.document()));
    println!("🔗 {}", session.share_link());
    Ok(())
}

fn enter_invoice_items(session: &mut Session<LatestLink>) -> Result<()> {
    println!("\n--- Enter Invoice Items ---");
    println!("(Leave Description empty to finish)");

    loop {
        let description = Text::new("Description (leave empty to finish):").prompt()?;
        if description.trim().is_empty() {
            break;
        }
        let value: f64 = CustomType::new("Value (₹):")
            .with_error_message("Please type a number")
            .with_validator(amount_validator)
            .prompt()?;
        let hsn = Text::new("HSN/SAC:").prompt()?;
        let rate: f64 = CustomType::new("GST Rate %:")
            .with_default(18.0)
            .with_error_message("Please type a number")
            .with_validator(amount_validator)
            .prompt()?;

        session.apply(|d| {
            let (next, id) = d.with_new_item();
            match next.item(&id).cloned() {
                Some(mut item) => {
                    item.description = description;
                    item.value = value;
                    item.hsn_code = hsn;
                    item.tax_rate_percent = rate;
                    next.with_item(item)
                }
                None => next,
            }
        });
    }
    Ok(())
}

// ==========================================
// 3. Share & Export
// ==========================================

fn share(link: &str) {
    println!("{link}");
    if copy_to_clipboard(link) {
        println!("✅ Link copied!");
    } else {
        debug!("no clipboard tool accepted the link");
    }
}

fn clipboard_commands() -> &'static [(&'static str, &'static [&'static str])] {
    #[cfg(target_os = "macos")]
    return &[("pbcopy", &[])];
    #[cfg(target_os = "windows")]
    return &[("clip", &[])];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    return &[
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
    ];
}

fn copy_to_clipboard(text: &str) -> bool {
    for (bin, args) in clipboard_commands() {
        let Ok(mut child) = Command::new(bin).args(*args).stdin(Stdio::piped()).spawn() else {
            continue;
        };
        let written = child
            .stdin
            .take()
            .map(|mut stdin| stdin.write_all(text.as_bytes()).is_ok())
            .unwrap_or(false);
        if written && child.wait().map(|s| s.success()).unwrap_or(false) {
            return true;
        }
    }
    false
}

fn prepare_export(settings: &AppSettings) -> Result<(Renderer, HttpFetcher), ExportError> {
    let renderer = Renderer::new(settings.template_path().as_deref())?;
    let fetcher = HttpFetcher::new(settings.asset_path(), codec::parse_base(&settings.base_url).ok())?;
    Ok((renderer, fetcher))
}

fn export_pdf(settings: &AppSettings, doc: &Document, out_dir: &Path) {
    let printer = TypstPrinter::new(settings.typst_bin.clone());
    if !printer.is_installed() {
        warn!("'{}' is not installed. Please install it (brew install typst).", settings.typst_bin);
    }

    let Some((renderer, fetcher)) = or_notify(prepare_export(settings)) else {
        return;
    };
    let cache = ImageCache::new();
    let exporter = Exporter::new(&renderer, &fetcher, &cache, &printer);

    println!("\n🔨 Compiling PDF...");
    if let Some(report) = export_or_notify(&exporter, doc, out_dir) {
        for src in &report.failed_images {
            println!("⚠️  Image could not be embedded: {src}");
        }
        info!(path = ?report.path, inlined = report.inlined, "exported");
        println!("🖼️  {} image(s) embedded", report.inlined);
        println!("✅ PDF Generated: {:?}", report.path);
        open_and_reveal(&report.path);
    }
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "linux")]
    if let Some(parent) = path.parent() {
        Command::new("xdg-open").arg(parent).spawn().ok();
    }
}
