use backoffice_core::{Audited, InvoiceId, MovementId, ProductId, Stampable, TenantScoped};
use backoffice_invoicing::OutboundMovement;

/// Inventory movement row. Outbound quantities are stored negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub id: MovementId,
    pub tenant: TenantScoped,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: String,
    pub invoice_id: Option<InvoiceId>,
    pub audit: Audited,
}

impl StockMovement {
    pub fn outbound(movement: OutboundMovement) -> Self {
        Self {
            id: MovementId::new(),
            tenant: TenantScoped::unassigned(),
            product_id: movement.product_id,
            quantity: -movement.quantity.abs(),
            reason: movement.reason,
            invoice_id: Some(movement.invoice_id),
            audit: Audited::default(),
        }
    }
}

impl Stampable for StockMovement {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }

    fn audit_mut(&mut self) -> Option<&mut Audited> {
        Some(&mut self.audit)
    }
}
