//! Minimal HTML pages shown to whoever scans a delivery QR code.

use lifecycle::ScanOutcome;

fn page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html>\
         <html lang=\"fr\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{title}</title>\
         <style>body{{font-family:sans-serif;max-width:32rem;margin:4rem auto;\
         padding:0 1rem;text-align:center}}h1{{font-size:1.4rem}}</style>\
         </head><body><h1>{title}</h1><p>{message}</p></body></html>"
    )
}

/// Page for one scan outcome.
pub fn scan_page(count: i64, outcome: ScanOutcome) -> String {
    match outcome {
        ScanOutcome::NotFound => page(
            "Commande introuvable",
            &format!("Aucune commande ne correspond au numéro {}.", count),
        ),
        ScanOutcome::NotReady => page(
            "Commande pas encore prête",
            "Cette commande n'est pas encore en préparation.",
        ),
        ScanOutcome::AlreadyProcessed => page(
            "Déjà traité",
            "Cette livraison a déjà été marquée comme reçue.",
        ),
        ScanOutcome::Shipped => page(
            "Expédition enregistrée",
            &format!("La commande n° {} est marquée comme expédiée.", count),
        ),
        ScanOutcome::Received => page(
            "Livraison confirmée",
            &format!("La commande n° {} est marquée comme livrée. Merci !", count),
        ),
    }
}

/// Page for a missing or non-numeric count parameter.
pub fn bad_request_page() -> String {
    page("Lien invalide", "Le lien scanné est incomplet ou invalide.")
}

/// Generic page for unexpected failures; no detail is leaked.
pub fn error_page() -> String {
    page(
        "Erreur",
        "Une erreur est survenue. Merci de réessayer plus tard.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_mention_the_count() {
        let html = scan_page(42, ScanOutcome::Shipped);
        assert!(html.contains("42"));
        assert!(html.contains("expédiée"));
    }

    #[test]
    fn error_page_leaks_nothing() {
        let html = error_page();
        assert!(!html.to_lowercase().contains("stack"));
        assert!(html.contains("réessayer"));
    }
}
