use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{ArgAction, Args, Parser, Subcommand};
use labdesk::{
    client::{HttpLabApi, LabApi},
    config::{self, AppConfig},
    models::{
        Attachment, CustomerId, CustomerInput, OrderId, ParameterId, ParameterInput, QuotationId,
        SampleCondition, SampleId, SampleInput,
    },
    services::{
        catalog::{CatalogRow, ParameterCatalog, RowKind},
        catalog_import,
        lifecycle::{EntryStatus, SubmissionReport},
        parameters::ParameterValues,
        quotation_document::{self, QuotationDocument},
        results::{self, ResultEntry, ResultReport, RowStatus},
        LabServices,
    },
    session::{SessionContext, SessionStore, ViewMode},
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize()?;

    match cli.command {
        Commands::Catalog(command) => handle_catalog_command(&context, command, cli.json).await?,
        Commands::Parameters(command) => {
            handle_parameters_command(&context, command, cli.json).await?
        }
        Commands::Requests(command) => handle_requests_command(&context, command, cli.json).await?,
        Commands::Basket(command) => handle_basket_command(&context, command, cli.json).await?,
        Commands::Samples(command) => handle_samples_command(&context, command, cli.json).await?,
        Commands::Results(command) => handle_results_command(&context, command, cli.json).await?,
        Commands::Quotations(command) => {
            handle_quotations_command(&context, command, cli.json).await?
        }
        Commands::Status(args) => handle_status(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "labdesk",
    about = "Laboratory desk CLI: catalog, requests, quotations and results",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Catalog(CatalogCommands),
    #[command(subcommand)]
    Parameters(ParametersCommands),
    #[command(subcommand)]
    Requests(RequestsCommands),
    #[command(subcommand)]
    Basket(BasketCommands),
    #[command(subcommand)]
    Samples(SamplesCommands),
    #[command(subcommand)]
    Results(ResultsCommands),
    #[command(subcommand)]
    Quotations(QuotationsCommands),
    /// Show (and optionally advance) the lifecycle stage of an order
    Status(StatusArgs),
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Render the selection view using the session basket
    Show(CatalogShowArgs),
    /// List orphaned parameters and parent loops
    Issues,
    /// Print the full category path of a parameter
    Path(ParameterIdArg),
}

#[derive(Args)]
struct CatalogShowArgs {
    #[arg(long, help = "Switch to search mode with this term; empty returns to the tree")]
    search: Option<String>,
}

#[derive(Args)]
struct ParameterIdArg {
    #[arg(help = "Parameter id")]
    id: ParameterId,
}

#[derive(Subcommand)]
enum ParametersCommands {
    Create(ParameterArgs),
    Update(UpdateParameterArgs),
    Delete(ParameterIdArg),
    /// Leaf parameters whose range and methods can be set
    Candidates,
    SetValues(SetValuesArgs),
    /// Create parameters from an indented price list
    Import(ImportArgs),
    /// Apply a unit/method CSV sheet to the catalog
    Methods(MethodsArgs),
}

#[derive(Args)]
struct ParameterArgs {
    #[arg(long, help = "Parameter or category name")]
    name: String,
    #[arg(long, help = "Parent category id")]
    parent: Option<ParameterId>,
    #[arg(long, help = "Unit price; leave empty for a category")]
    price: Option<Decimal>,
    #[arg(long)]
    unit: Option<String>,
    #[arg(long, help = "Lower bound of the acceptable range")]
    min: Option<f64>,
    #[arg(long, help = "Upper bound of the acceptable range")]
    max: Option<f64>,
    #[arg(long, help = "IS:3025 method reference")]
    is_method: Option<String>,
    #[arg(long, help = "APHA 24th edition method reference")]
    apha_method: Option<String>,
}

impl From<ParameterArgs> for ParameterInput {
    fn from(args: ParameterArgs) -> Self {
        ParameterInput {
            name: args.name,
            parent_id: args.parent,
            price: args.price,
            unit: args.unit,
            min_range: args.min,
            max_range: args.max,
            is_3025_method: args.is_method,
            apha_24th_edition_method: args.apha_method,
        }
    }
}

#[derive(Args)]
struct UpdateParameterArgs {
    #[arg(help = "Parameter id")]
    id: ParameterId,
    #[command(flatten)]
    values: ParameterArgs,
}

#[derive(Args)]
struct SetValuesArgs {
    #[arg(help = "Parameter id")]
    id: ParameterId,
    #[arg(long)]
    min: Option<f64>,
    #[arg(long)]
    max: Option<f64>,
    #[arg(long)]
    is_method: Option<String>,
    #[arg(long)]
    apha_method: Option<String>,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(help = "Text file with one parameter per line, indented by level")]
    file: PathBuf,
}

#[derive(Args)]
struct MethodsArgs {
    #[arg(help = "CSV with processed_name, unit, is_3025_method, apha_24th_edition_method")]
    file: PathBuf,
}

#[derive(Subcommand)]
enum RequestsCommands {
    /// Register a customer request and open its order
    Intake(IntakeArgs),
    Edit(EditRequestArgs),
    /// Delete a customer request with its order, quotations and samples
    Delete(CustomerIdArg),
    List(ListRequestsArgs),
}

#[derive(Args)]
struct CustomerArgs {
    #[arg(long, help = "Company name")]
    company: Option<String>,
    #[arg(long, help = "Contact person")]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    whatsapp: Option<String>,
    #[arg(long)]
    address: String,
}

impl From<CustomerArgs> for CustomerInput {
    fn from(args: CustomerArgs) -> Self {
        CustomerInput {
            c_name: args.company.unwrap_or_default(),
            name: args.name,
            email: args.email,
            phone_number: args.phone,
            whatsapp_number: args.whatsapp.unwrap_or_default(),
            address: args.address,
            is_delete: false,
        }
    }
}

#[derive(Args)]
struct IntakeArgs {
    #[command(flatten)]
    customer: CustomerArgs,
    #[arg(long, help = "What the customer asked for")]
    comment: Option<String>,
    #[arg(long, help = "Request document to attach (pdf, docx, txt, xlsx, csv)")]
    document: Option<PathBuf>,
}

#[derive(Args)]
struct EditRequestArgs {
    #[arg(help = "Order id")]
    order_id: OrderId,
    #[command(flatten)]
    customer: CustomerArgs,
    #[arg(long, help = "New request comment; the current one is kept when omitted")]
    comment: Option<String>,
    #[arg(long, help = "Replacement request document")]
    document: Option<PathBuf>,
}

#[derive(Args)]
struct CustomerIdArg {
    #[arg(help = "Customer request id")]
    id: CustomerId,
}

#[derive(Args)]
struct ListRequestsArgs {
    #[arg(long, help = "Filter by name, email or company")]
    search: Option<String>,
}

#[derive(Subcommand)]
enum BasketCommands {
    Select(ParameterIdArg),
    Deselect(ParameterIdArg),
    Qty(QuantityArgs),
    Show,
    /// Make this order the target of the next submission
    Order(OrderIdArg),
    Cancel,
    /// Create the quotation and order parameters for the active order
    Submit,
}

#[derive(Args)]
struct QuantityArgs {
    #[arg(help = "Parameter id")]
    id: ParameterId,
    #[arg(help = "Quantity, at least 1")]
    quantity: u32,
}

#[derive(Args)]
struct OrderIdArg {
    #[arg(help = "Order id")]
    id: OrderId,
}

#[derive(Subcommand)]
enum SamplesCommands {
    Register(RegisterSampleArgs),
    Edit(EditSampleArgs),
    Delete(SampleIdArg),
    List(OrderIdArg),
}

#[derive(Args)]
struct EditSampleArgs {
    #[arg(help = "Sample id")]
    id: SampleId,
    #[command(flatten)]
    sample: RegisterSampleArgs,
}

#[derive(Args)]
struct SampleIdArg {
    #[arg(help = "Sample id")]
    id: SampleId,
}

#[derive(Args)]
struct RegisterSampleArgs {
    #[arg(long)]
    order: OrderId,
    #[arg(long, help = "Sample type, e.g. Drinking Water")]
    sample_type: String,
    #[arg(long, help = "Collection date (YYYY-MM-DD)")]
    collected: NaiveDate,
    #[arg(long, help = "Receipt date (YYYY-MM-DD)")]
    received: NaiveDate,
    #[arg(long)]
    collected_by: String,
    #[arg(long, default_value = "")]
    particulars: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    quantity: String,
    #[arg(long, help = "Good, Average or Bad")]
    condition: SampleCondition,
}

impl From<RegisterSampleArgs> for SampleInput {
    fn from(args: RegisterSampleArgs) -> Self {
        SampleInput {
            order_id: args.order,
            sample_type: args.sample_type,
            collect_date: args.collected,
            receipt_date: args.received,
            collected_by: args.collected_by,
            particulars: args.particulars,
            location: args.location,
            quantity: args.quantity,
            condition: args.condition,
        }
    }
}

#[derive(Subcommand)]
enum ResultsCommands {
    Show(QuotationIdArg),
    Record(RecordResultsArgs),
    Export(ExportArgs),
}

#[derive(Args)]
struct QuotationIdArg {
    #[arg(help = "Quotation id")]
    id: QuotationId,
}

#[derive(Args)]
struct RecordResultsArgs {
    #[arg(help = "Quotation id")]
    id: QuotationId,
    #[arg(long = "result", value_name = "PARAM=VALUE", help = "Result for a parameter")]
    results: Vec<String>,
    #[arg(long = "protocol", value_name = "PARAM=NAME", help = "Chosen standard protocol")]
    protocols: Vec<String>,
    #[arg(long = "home", value_name = "PARAM=NAME", help = "In-house protocol, overrides the standard one")]
    home_protocols: Vec<String>,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(help = "Quotation id")]
    id: QuotationId,
    #[arg(long, help = "CSV destination; prints to stdout when omitted")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum QuotationsCommands {
    Overview(OverviewArgs),
    /// Render the quotation document with taxes and amount in words
    Document(DocumentArgs),
}

#[derive(Args)]
struct OverviewArgs {
    #[arg(long, help = "Only customers whose name contains this")]
    customer: Option<String>,
}

#[derive(Args)]
struct DocumentArgs {
    #[arg(help = "Quotation id")]
    id: QuotationId,
    #[arg(long, help = "Document date (YYYY-MM-DD), defaults to today")]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct StatusArgs {
    #[arg(help = "Order id")]
    order_id: OrderId,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Write the derived stage back to the order when it moved forward"
    )]
    sync: bool,
}

struct CliContext {
    config: AppConfig,
    api: Arc<dyn LabApi>,
    services: LabServices,
    sessions: SessionStore,
}

impl CliContext {
    fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let api: Arc<dyn LabApi> =
            Arc::new(HttpLabApi::from_config(&config).context("failed to build API client")?);
        let services = LabServices::new(api.clone());
        let sessions = SessionStore::new(config.session_file());
        debug!(target: "labdesk_cli", base_url = %config.api_base_url, "client ready");

        Ok(Self {
            config,
            api,
            services,
            sessions,
        })
    }

    fn load_session(&self) -> Result<SessionContext> {
        self.sessions.load().with_context(|| {
            format!(
                "failed to read session file {}",
                self.sessions.path().display()
            )
        })
    }

    fn save_session(&self, session: &mut SessionContext) -> Result<()> {
        self.sessions.save(session).with_context(|| {
            format!(
                "failed to write session file {}",
                self.sessions.path().display()
            )
        })
    }

    async fn catalog(&self) -> Result<ParameterCatalog> {
        ParameterCatalog::load(self.api.as_ref())
            .await
            .context("failed to load parameter catalog")
    }
}

async fn handle_catalog_command(
    context: &CliContext,
    command: CatalogCommands,
    json: bool,
) -> Result<()> {
    match command {
        CatalogCommands::Show(args) => {
            let mut session = context.load_session()?;
            if let Some(term) = args.search {
                session.set_search(&term);
                context.save_session(&mut session)?;
            }
            let catalog = context.catalog().await?;
            let rows = match session.view_mode {
                ViewMode::Hierarchy => catalog.render_hierarchy(&session.basket),
                ViewMode::Search => catalog.render(&session.search_term, &session.basket),
            };
            if json {
                print_json(&rows)?;
            } else {
                if rows.is_empty() {
                    println!("No parameters match '{}'", session.search_term);
                }
                rows.iter().for_each(render_catalog_row);
                println!("Basket total: {}", session.basket.grand_total());
            }
        }
        CatalogCommands::Issues => {
            let catalog = context.catalog().await?;
            if json {
                print_json(&catalog.issues())?;
            } else if catalog.issues().is_empty() {
                println!("Catalog is consistent ({} parameters)", catalog.len());
            } else {
                for issue in catalog.issues() {
                    println!("- {:?}", issue);
                }
            }
        }
        CatalogCommands::Path(arg) => {
            let catalog = context.catalog().await?;
            let path = catalog
                .path_name(arg.id)
                .ok_or_else(|| anyhow!("parameter {} not found", arg.id))?;
            if json {
                print_json(&path)?;
            } else {
                println!("{}", path);
            }
        }
    }
    Ok(())
}

async fn handle_parameters_command(
    context: &CliContext,
    command: ParametersCommands,
    json: bool,
) -> Result<()> {
    let admin = &context.services.parameters;
    match command {
        ParametersCommands::Create(args) => {
            let created = admin
                .create(args.into())
                .await
                .context("failed to create parameter")?;
            if json {
                print_json(&created)?;
            } else {
                println!("Parameter {} created (id {})", created.name, created.id);
            }
        }
        ParametersCommands::Update(args) => {
            admin
                .update(args.id, args.values.into())
                .await
                .with_context(|| format!("failed to update parameter {}", args.id))?;
            println!("Parameter {} updated", args.id);
        }
        ParametersCommands::Delete(arg) => {
            admin
                .delete(arg.id)
                .await
                .with_context(|| format!("failed to delete parameter {}", arg.id))?;
            println!("Parameter {} deleted", arg.id);
        }
        ParametersCommands::Candidates => {
            let candidates = admin.value_set_candidates().await?;
            if json {
                print_json(&candidates)?;
            } else {
                for parameter in &candidates {
                    println!(
                        "- {} • {} • range {} • methods {}",
                        parameter.id,
                        parameter.name,
                        parameter.range_label(),
                        parameter.protocol_options().join(" / ")
                    );
                }
            }
        }
        ParametersCommands::SetValues(args) => {
            let values = ParameterValues {
                min_range: args.min,
                max_range: args.max,
                is_3025_method: args.is_method,
                apha_24th_edition_method: args.apha_method,
            };
            let updated = admin
                .set_values(args.id, values)
                .await
                .with_context(|| format!("failed to set values on parameter {}", args.id))?;
            if json {
                print_json(&updated)?;
            } else {
                println!("Parameter {} now {}", updated.name, updated.range_label());
            }
        }
        ParametersCommands::Import(args) => {
            let text = fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            let lines = catalog_import::parse_price_list(&text)?;
            let outcome = catalog_import::import_price_list(context.api.as_ref(), &lines).await;
            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Imported {} parameters, {} failed, {} skipped",
                    outcome.created.len(),
                    outcome.failed.len(),
                    outcome.skipped.len()
                );
                for rejected in outcome.failed.iter().chain(outcome.skipped.iter()) {
                    println!("- line {} {}: {}", rejected.line_no, rejected.name, rejected.reason);
                }
            }
        }
        ParametersCommands::Methods(args) => {
            let file = fs::File::open(&args.file)
                .with_context(|| format!("failed to open {}", args.file.display()))?;
            let rows = catalog_import::read_method_sheet(file)?;
            let outcome = catalog_import::apply_method_sheet(context.api.as_ref(), &rows).await?;
            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Updated {} parameters, inserted {}, {} failed",
                    outcome.updated,
                    outcome.inserted,
                    outcome.failed.len()
                );
            }
        }
    }
    Ok(())
}

fn read_document(path: Option<PathBuf>) -> Result<Option<Attachment>> {
    path.map(|p| {
        Attachment::read_from(&p).with_context(|| format!("failed to attach {}", p.display()))
    })
    .transpose()
}

async fn handle_requests_command(
    context: &CliContext,
    command: RequestsCommands,
    json: bool,
) -> Result<()> {
    let lifecycle = &context.services.lifecycle;
    match command {
        RequestsCommands::Intake(args) => {
            let document = read_document(args.document)?;
            let outcome = lifecycle
                .intake(
                    args.customer.into(),
                    args.comment,
                    document,
                    Local::now().date_naive(),
                )
                .await
                .context("failed to register customer request")?;

            let mut session = context.load_session()?;
            session.active_order = Some(outcome.order.id);
            context.save_session(&mut session)?;

            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Request {} registered for {} (order {}, {})",
                    outcome.order.order_number,
                    outcome.customer.name,
                    outcome.order.id,
                    outcome.customer.id
                );
                println!("Order {} is now the active order", outcome.order.id);
            }
        }
        RequestsCommands::Edit(args) => {
            let document = read_document(args.document)?;
            lifecycle
                .edit_request(args.order_id, args.customer.into(), args.comment, document)
                .await
                .with_context(|| format!("failed to edit request for order {}", args.order_id))?;
            println!("Request for order {} updated", args.order_id);
        }
        RequestsCommands::Delete(arg) => {
            let report = lifecycle
                .delete_request(arg.id)
                .await
                .with_context(|| format!("failed to delete customer request {}", arg.id))?;
            if json {
                print_json(&report)?;
            } else {
                for step in &report.completed {
                    println!("- {}", step);
                }
                println!("Customer request {} deleted", arg.id);
            }
        }
        RequestsCommands::List(args) => {
            let requests = context
                .services
                .overview
                .requests(args.search.as_deref())
                .await?;
            if json {
                print_json(&requests)?;
            } else if requests.is_empty() {
                println!("No customer requests");
            } else {
                for summary in &requests {
                    let order = summary
                        .order
                        .as_ref()
                        .map(|o| {
                            format!(
                                "order {} {} • {}",
                                o.id,
                                o.order_number,
                                o.status.as_deref().unwrap_or("-")
                            )
                        })
                        .unwrap_or_else(|| "no order".to_string());
                    println!(
                        "- Request {} • {} ({}) • {} • {}",
                        summary.customer.id,
                        summary.customer.name,
                        summary.customer.c_name,
                        summary.customer.email,
                        order
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_basket_command(
    context: &CliContext,
    command: BasketCommands,
    json: bool,
) -> Result<()> {
    let mut session = context.load_session()?;
    match command {
        BasketCommands::Select(arg) => {
            let catalog = context.catalog().await?;
            let parameter = catalog
                .get(arg.id)
                .ok_or_else(|| anyhow!("parameter {} not found", arg.id))?;
            session.basket.toggle_select(parameter, true)?;
        }
        BasketCommands::Deselect(arg) => {
            let catalog = context.catalog().await?;
            let parameter = catalog
                .get(arg.id)
                .ok_or_else(|| anyhow!("parameter {} not found", arg.id))?;
            session.basket.toggle_select(parameter, false)?;
        }
        BasketCommands::Qty(args) => session.basket.set_quantity(args.id, args.quantity)?,
        BasketCommands::Show => {}
        BasketCommands::Order(arg) => {
            context
                .api
                .get_order(arg.id)
                .await?
                .ok_or_else(|| anyhow!("order {} not found", arg.id))?;
            session.active_order = Some(arg.id);
        }
        BasketCommands::Cancel => session.cancel_basket(),
        BasketCommands::Submit => {
            let order_id = session
                .active_order
                .ok_or_else(|| anyhow!("no active order; run `basket order <id>` first"))?;
            let order = context
                .api
                .get_order(order_id)
                .await?
                .ok_or_else(|| anyhow!("order {} not found", order_id))?;
            let SessionContext {
                basket,
                pending_submission,
                ..
            } = &mut session;
            let outcome = context
                .services
                .lifecycle
                .submit_basket(&order, basket, pending_submission)
                .await;
            // Persist what was posted even when some entries failed.
            context.save_session(&mut session)?;
            let report = outcome.context("failed to submit basket")?;
            if json {
                print_json(&report)?;
            } else {
                render_submission(&report);
            }
            return Ok(());
        }
    }
    context.save_session(&mut session)?;

    if json {
        print_json(&session.basket)?;
    } else {
        for entry in session.basket.entries() {
            println!(
                "- {} • {} • {} x {} = {}",
                entry.parameter_id,
                entry.name,
                entry.unit_cost,
                entry.quantity,
                entry.line_total()
            );
        }
        println!("Total: {}", session.basket.grand_total());
        if let Some(order_id) = session.active_order {
            println!("Active order: {}", order_id);
        }
    }
    Ok(())
}

async fn handle_samples_command(
    context: &CliContext,
    command: SamplesCommands,
    json: bool,
) -> Result<()> {
    match command {
        SamplesCommands::Register(args) => {
            let sample = context
                .services
                .lifecycle
                .register_sample(args.into())
                .await
                .context("failed to register sample")?;
            if json {
                print_json(&sample)?;
            } else {
                println!("Sample {} registered on order {}", sample.id, sample.order_id);
            }
        }
        SamplesCommands::Edit(args) => {
            let sample = context
                .services
                .lifecycle
                .update_sample(args.id, args.sample.into())
                .await
                .with_context(|| format!("failed to update sample {}", args.id))?;
            if json {
                print_json(&sample)?;
            } else {
                println!("Sample {} updated on order {}", sample.id, sample.order_id);
            }
        }
        SamplesCommands::Delete(arg) => {
            let sample = context
                .services
                .lifecycle
                .delete_sample(arg.id)
                .await
                .with_context(|| format!("failed to delete sample {}", arg.id))?;
            if json {
                print_json(&sample)?;
            } else {
                println!("Sample {} removed from order {}", sample.id, sample.order_id);
            }
        }
        SamplesCommands::List(arg) => {
            let samples = context.services.overview.samples(arg.id).await?;
            if json {
                print_json(&samples)?;
            } else {
                for sample in &samples {
                    println!(
                        "- Sample {} • {} • collected {} by {} • {}",
                        sample.id,
                        sample.sample_type,
                        sample
                            .collect_date
                            .map(|d| d.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        sample.collected_by,
                        sample
                            .condition
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }
        }
    }
    Ok(())
}

fn parse_assignment(raw: &str) -> Result<(ParameterId, String)> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected PARAM=VALUE, got '{}'", raw))?;
    let id = id
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a parameter id", id))?;
    Ok((id, value.trim().to_string()))
}

fn collect_entries(args: &RecordResultsArgs) -> Result<Vec<ResultEntry>> {
    let mut entries: Vec<ResultEntry> = Vec::new();
    for raw in &args.results {
        let (parameter_id, result) = parse_assignment(raw)?;
        entries.push(ResultEntry {
            parameter_id,
            result,
            ..ResultEntry::default()
        });
    }
    for raw in &args.protocols {
        let (parameter_id, protocol) = parse_assignment(raw)?;
        let entry = entries
            .iter_mut()
            .find(|e| e.parameter_id == parameter_id)
            .ok_or_else(|| anyhow!("protocol given for {} without a result", parameter_id))?;
        entry.protocol = Some(protocol);
    }
    for raw in &args.home_protocols {
        let (parameter_id, home) = parse_assignment(raw)?;
        let entry = entries
            .iter_mut()
            .find(|e| e.parameter_id == parameter_id)
            .ok_or_else(|| anyhow!("home protocol given for {} without a result", parameter_id))?;
        entry.home_protocol = Some(home);
    }
    Ok(entries)
}

async fn handle_results_command(
    context: &CliContext,
    command: ResultsCommands,
    json: bool,
) -> Result<()> {
    let service = &context.services.results;
    match command {
        ResultsCommands::Show(arg) => {
            let rows = service.rows(arg.id).await?;
            if json {
                print_json(&rows)?;
            } else {
                for row in &rows {
                    println!(
                        "- {} • {} • result {} {} • range {} • protocol {}",
                        row.parameter_id(),
                        row.name,
                        row.order_parameter.result.as_deref().unwrap_or("-"),
                        row.unit.as_deref().unwrap_or(""),
                        row.range_label(),
                        row.order_parameter
                            .home_protocol
                            .as_deref()
                            .or(row.order_parameter.protocol_used.as_deref())
                            .unwrap_or("-")
                    );
                }
            }
        }
        ResultsCommands::Record(args) => {
            let entries = collect_entries(&args)?;
            let report = service
                .submit(args.id, &entries)
                .await
                .with_context(|| format!("failed to record results for quotation {}", args.id))?;
            if json {
                print_json(&report)?;
            } else {
                render_result_report(&report);
            }
        }
        ResultsCommands::Export(args) => {
            let rows = results::export_rows(&service.rows(args.id).await?);
            match args.output {
                Some(path) => {
                    let file = fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    results::write_csv(&rows, file)?;
                    println!("Exported {} rows to {}", rows.len(), path.display());
                }
                None => results::write_csv(&rows, std::io::stdout())?,
            }
        }
    }
    Ok(())
}

async fn handle_quotations_command(
    context: &CliContext,
    command: QuotationsCommands,
    json: bool,
) -> Result<()> {
    match command {
        QuotationsCommands::Overview(args) => {
            let overview = context
                .services
                .overview
                .quotations(args.customer.as_deref())
                .await?;
            if json {
                print_json(&overview)?;
            } else {
                for item in &overview {
                    println!(
                        "- Quotation {} • {} • {} • {} parameters • total {}",
                        item.quotation_id,
                        item.order_number.as_deref().unwrap_or("-"),
                        item.customer_name.as_deref().unwrap_or("-"),
                        item.lines.len(),
                        item.total
                    );
                }
            }
        }
        QuotationsCommands::Document(args) => {
            let quotation = context
                .api
                .get_quotation(args.id)
                .await?
                .ok_or_else(|| anyhow!("quotation {} not found", args.id))?;
            let customer_id = quotation
                .customer_id
                .ok_or_else(|| anyhow!("quotation {} has no customer", args.id))?;
            let customer = context
                .api
                .get_customer(customer_id)
                .await?
                .ok_or_else(|| anyhow!("customer request {} not found", customer_id))?;
            let date = args.date.unwrap_or_else(|| Local::now().date_naive());
            let document =
                quotation_document::build_document(&context.config, &customer, &quotation, date);
            if json {
                print_json(&document)?;
            } else {
                render_document(&document);
            }
        }
    }
    Ok(())
}

async fn handle_status(context: &CliContext, args: StatusArgs, json: bool) -> Result<()> {
    let lifecycle = &context.services.lifecycle;
    if args.sync {
        let stage = lifecycle.sync_status(args.order_id).await?;
        debug!(target: "labdesk_cli", order_id = args.order_id, %stage, "status synced");
    }
    let snapshot = lifecycle.snapshot(args.order_id).await?;
    if json {
        print_json(&snapshot)?;
    } else {
        println!(
            "Order {} • {} • stage {} (recorded: {})",
            snapshot.order.id,
            snapshot.order.order_number,
            snapshot.stage,
            snapshot.order.status.as_deref().unwrap_or("-")
        );
        let with_results = snapshot
            .order_parameters
            .iter()
            .filter(|op| op.has_result())
            .count();
        println!(
            "  {} quotation(s) • {} sample(s) • results {}/{}",
            snapshot.quotations.len(),
            snapshot.samples.len(),
            with_results,
            snapshot.order_parameters.len()
        );
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_catalog_row(row: &CatalogRow) {
    let indent = "  ".repeat(row.depth);
    match &row.kind {
        RowKind::Category => println!("{}+ {}", indent, row.name),
        RowKind::Leaf {
            price,
            selected,
            quantity,
        } => println!(
            "{}[{}] {} ({}) • {}{}",
            indent,
            if *selected { "x" } else { " " },
            row.name,
            row.parameter_id,
            price,
            quantity.map(|q| format!(" x {}", q)).unwrap_or_default()
        ),
    }
}

fn render_submission(report: &SubmissionReport) {
    for entry in &report.entries {
        let status = match &entry.status {
            EntryStatus::Created => "created".to_string(),
            EntryStatus::AlreadyCreated => "already created".to_string(),
            EntryStatus::Failed { error } => format!("FAILED: {}", error),
        };
        println!("- {} {} • {}", entry.parameter_id, entry.name, status);
    }
    if report.is_complete() {
        println!(
            "Quotation {} created with {} parameters",
            report.quotation_id,
            report.succeeded_count()
        );
    } else {
        println!(
            "Quotation {} is incomplete; run `basket submit` again to retry the failed entries",
            report.quotation_id
        );
    }
}

fn render_result_report(report: &ResultReport) {
    for row in &report.rows {
        let status = match &row.status {
            RowStatus::Saved => "saved".to_string(),
            RowStatus::Failed { error } => format!("FAILED: {}", error),
        };
        println!("- {} {} = {} • {} • {}", row.parameter_id, row.name, row.result, row.range, status);
    }
    for row in report.out_of_range() {
        println!("! {} is outside its range ({})", row.name, row.range);
    }
    if !report.pending.is_empty() {
        println!("Still waiting for results on {:?}", report.pending);
    }
}

fn render_document(document: &QuotationDocument) {
    println!("Quotation {} dated {}", document.quotation_number, document.date);
    println!("{} • GSTIN {}", document.seller.company_name, document.seller.gstin);
    println!("To: {} ({})", document.buyer.company, document.buyer.contact);
    for line in &document.lines {
        println!(
            "{:>3}. {} • {} x {} = {}",
            line.index, line.product, line.unit_price, line.quantity, line.amount
        );
    }
    let totals = &document.totals;
    println!("Subtotal: {}", totals.subtotal);
    println!("SGST {}%: {}", totals.sgst_rate, totals.sgst_amount);
    println!("CGST {}%: {}", totals.cgst_rate, totals.cgst_amount);
    println!("Round off: {}", totals.round_off);
    println!("Total: {}", totals.total_amount);
    println!("{}", totals.amount_in_words);
}
