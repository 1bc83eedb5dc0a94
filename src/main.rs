//! storefront - command-line shop front for the storefront backend

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_client::admin::{AdminProductEditor, ImageUpload};
use storefront_client::domain::aggregates::{Cart, CheckoutPhase, CheckoutWizard, Product, CATEGORIES, STEP_LABELS};
use storefront_client::domain::events::DomainEvent;
use storefront_client::domain::value_objects::{field_messages, ProductId, Role};
use storefront_client::session::{guard, landing_route, Access, Credentials, Registration, Route};
use storefront_client::{
    CategoryFilter, FileSessionStore, HttpApi, ProductCatalog, Session, SessionManager, StorefrontConfig,
};

#[derive(Parser)]
#[command(name = "storefront", version, about = "Browse, buy and manage products")]
struct Cli {
    /// Backend API base URL
    #[arg(long, env = "STOREFRONT_API_URL", global = true)]
    api_url: Option<String>,

    /// Where the signed-in session is stored
    #[arg(long, env = "STOREFRONT_SESSION_FILE", global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value = "customer")]
        role: Role,
    },
    Logout,
    /// Show who is signed in
    Whoami,
    /// List products
    Products {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<CategoryFilter>,
    },
    /// Interactive shopping session (customers)
    Shop,
    /// Product management (admins)
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    Create(ProductArgs),
    /// Unset fields keep their current values
    Update {
        id: ProductId,
        #[command(flatten)]
        fields: ProductArgs,
    },
    Delete {
        id: ProductId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct ProductArgs {
    #[arg(long)]
    barcode: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    quantity: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// Image file, at most 5MB
    #[arg(long)]
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = StorefrontConfig::from_env()?;
    if let Some(raw) = &cli.api_url {
        config = config.with_api_url(raw)?;
    }
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }
    tracing::debug!(api_url = %config.api_url, session_file = %config.session_file.display(), "configuration loaded");

    let api = HttpApi::new(&config)?;
    let mut sessions = SessionManager::restore(FileSessionStore::new(&config.session_file));

    match cli.command {
        Command::Login { email, password } => {
            let session = sessions.login(&api, &Credentials::new(email, password)).await.map_err(show_field_errors)?;
            let landing = landing_route(Some(session));
            println!("Signed in as {} ({}). Continue at {landing}", session.user().name, session.role());
        }
        Command::Register { name, email, password, confirm_password, role } => {
            let registration = Registration { name, email, password, password_confirmation: confirm_password, role };
            let session = sessions.register(&api, &registration).await.map_err(show_field_errors)?;
            println!("Welcome, {}! Continue at {}", session.user().name, landing_route(Some(session)));
        }
        Command::Logout => {
            sessions.logout();
            println!("Signed out.");
        }
        Command::Whoami => match sessions.current() {
            Some(s) => {
                let since = s.signed_in_at().format("%Y-%m-%d %H:%M");
                println!("{} <{}> ({}) since {since}", s.user().name, s.user().email, s.role());
            }
            None => println!("Not signed in."),
        },
        Command::Products { search, category } => {
            let session = sessions.current().context("Please login to view products")?;
            let mut catalog = ProductCatalog::new();
            catalog.refresh(session, &api).await?;
            catalog.set_search(search.unwrap_or_default());
            catalog.set_category(category.unwrap_or_default());
            print_products(&catalog.visible());
        }
        Command::Shop => {
            let session = enter(Route::Dashboard, sessions.current())?;
            shop(session, &api).await?;
        }
        Command::Admin { action } => {
            let session = enter(Route::Admin, sessions.current())?;
            admin(session, &api, action).await?;
        }
    }
    Ok(())
}

fn enter(route: Route, session: Option<&Session>) -> Result<&Session> {
    match (guard(route, session), session) {
        (Access::Granted, Some(session)) => Ok(session),
        (Access::Redirect(Route::Unauthorized), _) => bail!("You are not authorized to view {route}"),
        _ => bail!("Please login first (storefront login --email ...)"),
    }
}

fn show_field_errors(err: storefront_client::AuthError) -> anyhow::Error {
    if let Some(errors) = err.field_errors() {
        for (field, message) in field_messages(errors) {
            eprintln!("  {field}: {message}");
        }
    }
    err.into()
}

fn announce(events: Vec<DomainEvent>) {
    for event in events {
        println!("{}", event.notification());
    }
}

fn print_products(products: &[&Product]) {
    if products.is_empty() {
        println!("No products found.");
        return;
    }
    for p in products {
        let stock = if p.is_in_stock() { format!("{} in stock", p.quantity) } else { "Out of stock".to_string() };
        println!("#{:<5} {:<32} {:>10}  {:<16} {}", p.id, p.description, p.price.to_string(), p.category, stock);
    }
}

fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Your cart is empty");
        return;
    }
    for item in cart.items() {
        println!("#{:<5} {:<32} {} x {} = {}", item.id, item.description, item.quantity, item.price, item.line_total());
    }
    println!("{} item(s), total {}", cart.item_count(), cart.cart_total());
}

struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self { Self { lines: BufReader::new(tokio::io::stdin()).lines() } }

    /// `None` once stdin is closed.
    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }

    async fn confirm(&mut self, label: &str) -> Result<bool> {
        Ok(matches!(self.ask(&format!("{label} [y/N] ")).await?.as_deref(), Some("y" | "Y" | "yes")))
    }
}

const SHOP_HELP: &str = "commands: list | search <text> | category <name|all> | add <id> | qty <id> <n> \
                         | remove <id> | cart | clear | checkout | refresh | quit";

async fn shop(session: &Session, api: &HttpApi) -> Result<()> {
    let mut catalog = ProductCatalog::new();
    let mut cart = Cart::new();
    let mut wizard = CheckoutWizard::new();
    let mut prompt = Prompt::new();

    if let Err(e) = catalog.refresh(session, api).await {
        println!("{e}");
    }
    println!("Categories: {}", CATEGORIES.join(", "));
    println!("{SHOP_HELP}");

    while let Some(line) = prompt.ask(&format!("[cart {}] > ", cart.item_count())).await? {
        let (command, rest) = line.split_once(' ').map_or((line.as_str(), ""), |(c, r)| (c, r.trim()));
        match command {
            "" => {}
            "list" | "ls" => print_products(&catalog.visible()),
            "search" => {
                catalog.set_search(rest);
                print_products(&catalog.visible());
            }
            "category" => {
                catalog.set_category(rest.parse().unwrap_or_default());
                print_products(&catalog.visible());
            }
            "add" => match rest.parse::<ProductId>().ok().and_then(|id| catalog.find(id)) {
                Some(p) if !p.is_in_stock() => println!("{} is out of stock", p.description),
                Some(p) => {
                    cart.add_to_cart(p);
                    println!("Added {} to cart", p.description);
                }
                None => println!("No such product"),
            },
            "qty" => match parse_quantity(rest) {
                Some((id, n)) => {
                    cart.update_quantity(id, n);
                    print_cart(&cart);
                }
                None => println!("usage: qty <id> <n>"),
            },
            "remove" | "rm" => match rest.parse::<ProductId>() {
                Ok(id) => {
                    cart.remove_from_cart(id);
                    print_cart(&cart);
                }
                Err(_) => println!("usage: remove <id>"),
            },
            "cart" => print_cart(&cart),
            "clear" => cart.clear_cart(),
            "refresh" => match catalog.refresh(session, api).await {
                Ok(count) => println!("{count} products"),
                Err(e) => println!("{e}"),
            },
            "checkout" => {
                if cart.is_empty() {
                    println!("Your cart is empty");
                    continue;
                }
                checkout(&mut wizard, &mut cart, session, api, &mut prompt).await?;
            }
            "help" | "?" => println!("{SHOP_HELP}"),
            "quit" | "exit" | "q" => break,
            other => println!("unknown command '{other}'; {SHOP_HELP}"),
        }
    }
    Ok(())
}

fn parse_quantity(rest: &str) -> Option<(ProductId, i64)> {
    let (id, n) = rest.split_once(' ')?;
    Some((id.parse().ok()?, n.trim().parse().ok()?))
}

async fn checkout(
    wizard: &mut CheckoutWizard,
    cart: &mut Cart,
    session: &Session,
    api: &HttpApi,
    prompt: &mut Prompt,
) -> Result<()> {
    wizard.open();
    while wizard.is_open() {
        println!("\nStep {} of {}: {}", wizard.active_step() + 1, STEP_LABELS.len(), STEP_LABELS[wizard.active_step()]);
        match wizard.phase() {
            CheckoutPhase::Shipping => {
                let shipping = wizard.shipping().clone();
                let fields = [
                    ("Full name", shipping.full_name),
                    ("Address", shipping.address),
                    ("City", shipping.city),
                    ("Postal code", shipping.postal_code),
                    ("Phone", shipping.phone),
                ];
                let mut answers = Vec::with_capacity(fields.len());
                for (label, current) in fields {
                    let Some(answer) = prompt.ask(&format!("{label} [{current}]: ")).await? else {
                        wizard.cancel();
                        return Ok(());
                    };
                    answers.push(if answer.is_empty() { current } else { answer });
                }
                let details = wizard.shipping_mut();
                let mut answers = answers.into_iter();
                details.full_name = answers.next().unwrap_or_default();
                details.address = answers.next().unwrap_or_default();
                details.city = answers.next().unwrap_or_default();
                details.postal_code = answers.next().unwrap_or_default();
                details.phone = answers.next().unwrap_or_default();
                if let Err(e) = wizard.next() {
                    println!("{e}");
                }
            }
            CheckoutPhase::Payment => {
                println!("Payment: {}", wizard.payment_method().label());
                match prompt.ask("[n]ext, [b]ack, [c]ancel: ").await?.as_deref() {
                    Some("n" | "next" | "") => {
                        wizard.next()?;
                    }
                    Some("b" | "back") => wizard.back(),
                    _ => wizard.cancel(),
                }
            }
            CheckoutPhase::Review => {
                if let Some(summary) = wizard.review_summary(cart) {
                    println!("{summary}");
                }
                match prompt.ask("[p]lace order, [b]ack, [c]ancel: ").await?.as_deref() {
                    Some("p" | "place") => {
                        if let Err(e) = wizard.submit_order(cart, session, api).await {
                            println!("✖ {e}");
                        }
                        announce(wizard.take_events());
                    }
                    Some("b" | "back") => wizard.back(),
                    _ => wizard.cancel(),
                }
            }
            CheckoutPhase::Idle => break,
        }
    }
    Ok(())
}

async fn admin(session: &Session, api: &HttpApi, action: AdminCommand) -> Result<()> {
    let mut editor = AdminProductEditor::new();
    editor.refresh(session, api).await?;

    match action {
        AdminCommand::Create(fields) => {
            editor.open_create();
            fill(&mut editor, fields)?;
            submit(&mut editor, session, api).await?;
        }
        AdminCommand::Update { id, fields } => {
            let product = editor.catalog().find(id).cloned().with_context(|| format!("Product #{id} not found"))?;
            editor.open_edit(&product);
            fill(&mut editor, fields)?;
            submit(&mut editor, session, api).await?;
        }
        AdminCommand::Delete { id, yes } => {
            let pending = editor.request_delete(id).clone();
            let question = format!("Delete #{} {}?", pending.product_id, pending.product_name);
            let confirmed = yes || Prompt::new().confirm(&question).await?;
            if !confirmed {
                editor.cancel_delete();
                println!("Cancelled.");
                return Ok(());
            }
            let result = editor.confirm_delete(session, api).await;
            announce(editor.take_events());
            result?;
        }
    }
    Ok(())
}

fn fill(editor: &mut AdminProductEditor, fields: ProductArgs) -> Result<()> {
    let form = editor.form_mut();
    let pairs = [
        (&mut form.barcode, fields.barcode),
        (&mut form.description, fields.description),
        (&mut form.price, fields.price),
        (&mut form.quantity, fields.quantity),
        (&mut form.category, fields.category),
    ];
    for (slot, value) in pairs {
        if let Some(value) = value {
            *slot = value;
        }
    }
    if let Some(path) = fields.image {
        let image = ImageUpload::from_path(&path).with_context(|| format!("reading {}", path.display()))?;
        let result = editor.select_image(image);
        announce(editor.take_events());
        result?;
    }
    Ok(())
}

async fn submit(editor: &mut AdminProductEditor, session: &Session, api: &HttpApi) -> Result<()> {
    let result = editor.submit(session, api).await;
    if let Err(storefront_client::EditorError::Invalid(errors)) = &result {
        for (field, message) in field_messages(errors) {
            eprintln!("  {field}: {message}");
        }
    }
    announce(editor.take_events());
    let product = result?;
    println!("#{} {} {}", product.id, product.description, product.price);
    Ok(())
}
