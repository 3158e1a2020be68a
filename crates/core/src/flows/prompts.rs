//! Customer-facing message texts. Everything a customer can read is authored here.

use crate::domain::cart::{Cart, CartLine};
use crate::domain::catalog::Dish;
use crate::domain::session::Checkout;
use crate::pricing::{format_brl, PricedOrder, PricingPolicy};
use crate::shipping::ShippingQuote;

pub fn welcome(business_name: &str) -> String {
    format!("👋 Olá! Bem-vindo(a) à *{business_name}*!\n\nPara começar, qual é o seu nome?")
}

pub fn name_too_short() -> String {
    "Por favor, digite um nome com pelo menos 2 letras.".to_owned()
}

pub fn menu(name: &str) -> String {
    format!(
        "{name}, o que você deseja?\n\n\
         1️⃣ Ver cardápio\n\
         2️⃣ Fazer pedido\n\
         3️⃣ Deixar uma sugestão\n\n\
         Digite *cancelar* a qualquer momento para recomeçar o pedido."
    )
}

pub fn catalog_view(dishes: &[Dish]) -> String {
    let mut text = "📋 *Cardápio de hoje*\n\n".to_owned();
    for dish in dishes {
        text.push_str(&format!("• {}\n", dish.name));
    }
    text.push_str("\n1️⃣ Fazer pedido\n0️⃣ Voltar ao menu");
    text
}

pub fn catalog_unavailable() -> String {
    "😕 Nosso cardápio está indisponível no momento. Tente novamente em alguns minutos.".to_owned()
}

pub fn dish_list(dishes: &[Dish]) -> String {
    let mut text = "🍽️ Escolha um prato digitando o número:\n".to_owned();
    for (index, dish) in dishes.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", index + 1, dish.name));
    }
    text
}

pub fn rice_prompt(dish_name: &str) -> String {
    format!("🍚 Qual arroz para *{dish_name}*?\n\n1️⃣ Branco\n2️⃣ Integral")
}

pub fn sauce_prompt(dish_name: &str) -> String {
    format!("🥫 Qual molho para *{dish_name}*?\n\n1️⃣ Vermelho\n2️⃣ Branco")
}

pub fn quantity_prompt(line: &CartLine) -> String {
    format!("Quantas unidades de *{}*? Digite um número.", line.description())
}

pub fn line_added(line: &CartLine) -> String {
    format!("✅ Adicionado: {line}")
}

pub fn add_another() -> String {
    "Deseja adicionar outro prato?\n\n\
     1️⃣ Sim\n\
     2️⃣ Não, finalizar pedido\n\
     0️⃣ Cancelar pedido"
        .to_owned()
}

pub fn order_summary(cart: &Cart, priced: &PricedOrder, pricing: &PricingPolicy) -> String {
    let mut text = "🧾 *Resumo do pedido*\n\n".to_owned();
    for line in cart.configured_lines() {
        text.push_str(&format!("• {line}\n"));
    }
    text.push_str(&format!(
        "\nTotal de unidades: {}\nValor unitário: {}\n*Subtotal: {}*",
        priced.total_units,
        format_brl(priced.unit_price),
        format_brl(priced.subtotal)
    ));
    if priced.total_units >= pricing.bulk_threshold {
        text.push_str(&format!(
            "\n\n🎉 Preço promocional aplicado para pedidos a partir de {} unidades!",
            pricing.bulk_threshold
        ));
    }
    text
}

pub fn postal_code_prompt() -> String {
    "📮 Informe o seu CEP (8 números) para calcularmos a entrega.".to_owned()
}

pub fn invalid_postal_code() -> String {
    "❌ CEP inválido. Digite os 8 números do seu CEP, por exemplo 01310100.".to_owned()
}

pub fn address_detail_prompt(quote: &ShippingQuote) -> String {
    format!(
        "📍 Endereço: {}\n🚚 {}\n\n\
         Digite o *número e complemento* do endereço.\n\
         0️⃣ Corrigir o CEP",
        quote.resolved_address, quote.human_text
    )
}

pub fn checkout_summary(cart: &Cart, checkout: &Checkout) -> String {
    let mut text = "🧾 *Confirme seu pedido*\n\n".to_owned();
    for line in cart.configured_lines() {
        text.push_str(&format!("• {line}\n"));
    }
    text.push_str(&format!(
        "\nValor unitário: {}\nSubtotal: {}\nEntrega: {}\n*Total: {}*\n\n📍 {}",
        format_brl(checkout.unit_price),
        format_brl(checkout.subtotal),
        format_brl(checkout.shipping_fee),
        format_brl(checkout.grand_total),
        checkout.address
    ));
    text
}

pub fn payment_method() -> String {
    "💳 Como deseja pagar?\n\n1️⃣ PIX\n2️⃣ Cartão (link de pagamento)".to_owned()
}

pub fn payment_failed() -> String {
    "⚠️ Não conseguimos gerar o pagamento agora. Vamos tentar de novo?\n\n\
     1️⃣ PIX\n\
     2️⃣ Cartão (link de pagamento)"
        .to_owned()
}

pub fn pix_instructions(checkout: &Checkout) -> String {
    format!(
        "✅ PIX de {} gerado! Copie o código da próxima mensagem e cole no app do seu banco.",
        format_brl(checkout.grand_total)
    )
}

pub fn card_link(checkout: &Checkout, link: &str) -> String {
    format!(
        "✅ Link de pagamento de {} gerado! Acesse para pagar com cartão:\n{link}",
        format_brl(checkout.grand_total)
    )
}

pub fn awaiting_payment() -> String {
    "⏳ Assim que o pagamento for confirmado você recebe o comprovante aqui.\n\n\
     1️⃣ Gerar novo PIX\n\
     2️⃣ Pagar com cartão\n\
     0️⃣ Escolher outra forma de pagamento"
        .to_owned()
}

pub fn in_production() -> String {
    "👨‍🍳 Seu pedido já está em produção! Para fazer outro pedido, digite *novo pedido*.".to_owned()
}

pub fn cancelled() -> String {
    "🗑️ Pedido cancelado.".to_owned()
}

pub fn cancel_refused() -> String {
    "Seu pagamento já foi confirmado e o pedido está em produção, então não é possível \
     cancelar por aqui. Se precisar de ajuda, responda esta mensagem que nossa equipe fala com você."
        .to_owned()
}

pub fn feedback_prompt() -> String {
    "💬 Escreva sua sugestão ou comentário.\n\n0️⃣ Voltar ao menu".to_owned()
}

pub fn feedback_thanks() -> String {
    "🙏 Obrigado! Sua mensagem foi enviada para a nossa equipe.".to_owned()
}

pub fn feedback_for_admin(name: &str, customer: &str, text: &str) -> String {
    format!("💬 Feedback de {name} ({customer}):\n\n{text}")
}

pub fn not_understood(last_prompt: Option<&str>) -> String {
    match last_prompt {
        Some(prompt) => format!("🤔 Desculpe, não entendi.\n\n{prompt}"),
        None => "🤔 Desculpe, não entendi.".to_owned(),
    }
}

pub fn inactivity_notice() -> String {
    "⏰ Seu atendimento foi encerrado por inatividade. Quando quiser, é só mandar uma \
     mensagem para recomeçar."
        .to_owned()
}

pub fn closed(opening_hours: &str) -> String {
    format!(
        "🕒 Estamos fechados no momento. Nosso horário de atendimento é {opening_hours}. \
         Esperamos você!"
    )
}

pub fn payment_confirmed(name: &str) -> String {
    format!(
        "🎉 Pagamento confirmado, {name}! Seu pedido já foi para a cozinha. \
         Obrigado pela preferência!"
    )
}

pub fn receipt_caption() -> String {
    "🧾 Seu comprovante".to_owned()
}

pub fn receipt_unavailable(receipt_text: &str) -> String {
    format!("Não conseguimos gerar o PDF do comprovante, mas seu pedido está confirmado:\n\n{receipt_text}")
}

pub fn order_for_admin(name: &str, customer: &str, receipt_text: &str) -> String {
    format!("🛎️ Novo pedido pago de {name} ({customer})\n\n{receipt_text}")
}
