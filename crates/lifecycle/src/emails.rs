//! Email builders for every customer-facing and internal notification.

use order_core::{EmailAttachment, Order, OutboundEmail};

/// Quotation email sent at intake, with the signing portal link.
pub(crate) fn quote_email(
    order: &Order,
    portal_url: Option<&str>,
    pdf: Option<EmailAttachment>,
) -> OutboundEmail {
    let name = order.client.display_name();
    let reference = order
        .request_number
        .as_deref()
        .unwrap_or("en cours d'attribution");

    let mut html = format!(
        "<p>Bonjour {},</p>\
         <p>Merci pour votre demande. Votre devis <strong>{}</strong> est prêt.</p>",
        name, reference
    );
    if let Some(url) = portal_url {
        html.push_str(&format!(
            "<p>Vous pouvez le consulter et le signer en ligne : \
             <a href=\"{}\">Signer mon devis</a></p>",
            url
        ));
    }
    html.push_str("<p>L'équipe Voltra</p>");

    let mut email = OutboundEmail::new(
        order.client.email.clone(),
        format!("Votre devis {}", reference),
        html,
    );
    if let Some(pdf) = pdf {
        email = email.attach(pdf);
    }
    email
}

/// Customer confirmation after payment, carrying the signed quotation,
/// the invoice, and the fixed legal documents.
pub(crate) fn customer_paid_email(
    order: &Order,
    attachments: Vec<EmailAttachment>,
) -> OutboundEmail {
    let name = order.client.display_name();
    let reference = order
        .request_number
        .as_deref()
        .unwrap_or("votre commande");

    let html = format!(
        "<p>Bonjour {},</p>\
         <p>Nous avons bien reçu votre paiement pour <strong>{}</strong>.</p>\
         <p>Vous trouverez en pièces jointes votre devis signé, votre facture \
         et nos documents contractuels.</p>\
         <p>Nous préparons maintenant votre commande.</p>\
         <p>L'équipe Voltra</p>",
        name, reference
    );

    let mut email = OutboundEmail::new(
        order.client.email.clone(),
        format!("Confirmation de paiement — {}", reference),
        html,
    );
    for attachment in attachments {
        email = email.attach(attachment);
    }
    email
}

/// Internal notification telling fulfillment to start preparing the order.
pub(crate) fn fulfillment_email(to: &str, order: &Order) -> OutboundEmail {
    let html = format!(
        "<p>Commande payée et facturée.</p>\
         <ul>\
         <li>Demande n° {}</li>\
         <li>Client : {} ({})</li>\
         <li>Travaux : {:?}, batteries {}, panneaux {}</li>\
         </ul>",
        order.platform_count,
        order.client.display_name(),
        order.client.email,
        order.work.kind,
        order.work.battery_count,
        order.work.panel_count,
    );
    OutboundEmail::new(
        to,
        format!("Nouvelle commande payée #{}", order.platform_count),
        html,
    )
}

/// Customer notification on the shipped scan.
pub(crate) fn shipped_email(order: &Order) -> OutboundEmail {
    let html = format!(
        "<p>Bonjour {},</p>\
         <p>Bonne nouvelle : votre commande n° {} a été expédiée.</p>\
         <p>L'équipe Voltra</p>",
        order.client.display_name(),
        order.platform_count
    );
    OutboundEmail::new(order.client.email.clone(), "Votre commande a été expédiée", html)
}

/// Customer notification on the received scan.
pub(crate) fn received_email(order: &Order) -> OutboundEmail {
    let html = format!(
        "<p>Bonjour {},</p>\
         <p>Votre commande n° {} a bien été livrée.</p>\
         <p>Merci de votre confiance.</p>\
         <p>L'équipe Voltra</p>",
        order.client.display_name(),
        order.platform_count
    );
    OutboundEmail::new(order.client.email.clone(), "Votre commande a été livrée", html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_core::{ClientInfo, PaymentStatus, Work};

    fn sample_order() -> Order {
        Order {
            platform_count: 7,
            quotation_id: 1007,
            request_number: Some("S01007".to_string()),
            payment_status: PaymentStatus::Pending,
            client: ClientInfo {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                ..Default::default()
            },
            address: Default::default(),
            work: Work::default(),
            delivery: None,
            pdfs: Default::default(),
            effects: Default::default(),
            source: "simulateur_ui".to_string(),
            created_at: chrono::Utc::now(),
            paid_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn quote_email_carries_portal_link() {
        let order = sample_order();
        let email = quote_email(&order, Some("https://erp.example/my/orders/1007"), None);
        assert_eq!(email.to, vec!["ada@example.com"]);
        assert_eq!(email.subject, "Votre devis S01007");
        assert!(email.html.contains("https://erp.example/my/orders/1007"));
    }

    #[test]
    fn fulfillment_email_is_internal() {
        let order = sample_order();
        let email = fulfillment_email("office@voltra.example", &order);
        assert_eq!(email.to, vec!["office@voltra.example"]);
        assert!(email.subject.contains("#7"));
    }
}
