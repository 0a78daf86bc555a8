/// Load a hotel's contacts, add an email and save both collections
///
/// Run with:
/// CONTACT_SYNC_API_URL=http://localhost:8000/api CONTACT_SYNC_TOKEN=... \
///   cargo run --example sync_hotel --package contact-sync-http -- 42 reservations@hotel.com
use anyhow::{Context, Result};
use contact_sync::{CollectionReconciler, HotelContactForm, ParentId};
use contact_sync_http::{ApiConfig, HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("contact_sync=debug,contact_sync_http=debug")
        .init();

    let mut args = std::env::args().skip(1);
    let hotel = args.next().context("usage: sync_hotel <hotel-id> [email]")?;
    let hotel = ParentId::new(hotel);

    let config = ApiConfig::from_env()?;
    println!("Using {:?}", config);
    let transport = HttpTransport::new(config)?;

    let mut form = HotelContactForm::load(&transport, hotel).await?;
    println!("Emails: {:?}", form.emails().values());
    println!("Phones: {:?}", form.phones().values());

    if let Some(email) = args.next() {
        let row = form.emails_mut().add_blank();
        form.emails_mut().set_value(row, &email);
    }

    let reconciler = CollectionReconciler::new(transport);
    let report = form.save(&reconciler).await?;

    for kind in report.to_view() {
        let mark = if kind.ok { "✓" } else { "✗" };
        println!("{} {}: {}", mark, kind.kind, kind.message);
    }

    Ok(())
}
