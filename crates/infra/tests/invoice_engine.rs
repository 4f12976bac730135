mod common;

use chrono::Duration;

use backoffice_core::{AggregateRoot, ErrorKind, PageRequest};
use backoffice_invoicing::{
    CreateInvoice, CustomerRef, InvoiceFilter, InvoiceStatus, NewInvoiceItem, PaymentType,
    RegisterPayment,
};
use backoffice_tenancy::TenantSettings;

use common::{Fixture, start};

fn payment(amount: i64) -> RegisterPayment {
    RegisterPayment {
        amount,
        method: "transfer".into(),
        reference: Some("  REF-1 ".into()),
    }
}

#[tokio::test]
async fn credit_invoice_opens_pending_and_moves_stock() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");

    let invoice = fx
        .invoices
        .create_invoice(
            &acme.scope(),
            CreateInvoice {
                customer_id: Some(acme.customer.id),
                payment_type: "credito".into(),
                credit_days: Some(30),
                items: vec![
                    NewInvoiceItem {
                        product_id: acme.widget.id,
                        quantity: 2,
                        unit_price: None,
                    },
                    NewInvoiceItem {
                        product_id: acme.gadget.id,
                        quantity: 3,
                        unit_price: Some(2_000),
                    },
                ],
            },
        )
        .await
        .unwrap();

    assert_eq!(invoice.number(), "FAC-0001");
    assert_eq!(invoice.payment_type(), PaymentType::Credit);
    assert_eq!(invoice.total(), 2 * 10_000 + 3 * 2_000);
    assert_eq!(invoice.paid_total(), 0);
    assert_eq!(invoice.balance(), invoice.total());
    assert_eq!(invoice.due_date(), start() + Duration::days(30));
    assert_eq!(invoice.status(), InvoiceStatus::Pending);
    assert_eq!(invoice.customer_name(), Some("acme customer"));
    assert_eq!(invoice.items().len(), 2);
    assert_eq!(invoice.items()[0].description, "Widget");
    assert_eq!(invoice.version(), 1);

    let movements = fx.store.movements(&acme.context()).unwrap();
    assert_eq!(movements.len(), 2);
    assert!(movements.iter().all(|m| m.reason == "Invoice FAC-0001"));
    assert!(movements.iter().all(|m| m.invoice_id == Some(invoice.id())));
    let mut quantities: Vec<_> = movements.iter().map(|m| m.quantity).collect();
    quantities.sort();
    assert_eq!(quantities, vec![-3, -2]);
}

#[tokio::test]
async fn cash_invoice_is_settled_on_creation() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");

    let invoice = fx
        .invoices
        .create_invoice(
            &acme.scope(),
            CreateInvoice {
                customer_id: None,
                payment_type: "contado".into(),
                credit_days: Some(45),
                items: vec![NewInvoiceItem {
                    product_id: acme.gadget.id,
                    quantity: 4,
                    unit_price: None,
                }],
            },
        )
        .await
        .unwrap();

    assert_eq!(invoice.status(), InvoiceStatus::Paid);
    assert_eq!(invoice.balance(), 0);
    assert_eq!(invoice.paid_total(), 10_000);
    assert_eq!(invoice.credit_days_applied().get(), 0);
    assert_eq!(invoice.due_date(), start());
    assert_eq!(invoice.payments().len(), 1);
    assert_eq!(invoice.payments()[0].method, "CASH");
    assert_eq!(invoice.payments()[0].tenant.tenant_id(), Some(acme.tenant.id));
}

#[tokio::test]
async fn creation_rejects_bad_commands() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let scope = acme.scope();

    let mut empty = acme.credit(1, None);
    empty.items.clear();
    let err = fx.invoices.create_invoice(&scope, empty).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut bad_type = acme.credit(1, None);
    bad_type.payment_type = "BARTER".into();
    let err = fx.invoices.create_invoice(&scope, bad_type).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut anonymous_credit = acme.credit(1, None);
    anonymous_credit.customer_id = None;
    let err = fx.invoices.create_invoice(&scope, anonymous_credit).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = fx
        .invoices
        .create_invoice(&scope, acme.credit(0, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = fx
        .invoices
        .create_invoice(&scope, acme.credit(1, Some(366)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut ghost_customer = acme.credit(1, None);
    ghost_customer.customer_id = Some(backoffice_core::CustomerId::new());
    let err = fx.invoices.create_invoice(&scope, ghost_customer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut retired = acme.widget.clone();
    retired.id = backoffice_core::ProductId::new();
    retired.is_active = false;
    fx.store.insert_product(acme.tenant.id, retired.clone()).unwrap();
    let mut inactive = acme.credit(1, None);
    inactive.items[0].product_id = retired.id;
    let err = fx.invoices.create_invoice(&scope, inactive).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Nothing was persisted or moved by the failures.
    assert!(fx.store.movements(&acme.context()).unwrap().is_empty());
}

#[tokio::test]
async fn credit_days_fall_back_to_customer_then_tenant() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");

    let explicit = fx.credit_invoice(&acme, 1, 20).await;
    assert_eq!(explicit.credit_days_applied().get(), 20);

    let implicit = fx
        .invoices
        .create_invoice(&acme.scope(), acme.credit(1, None))
        .await
        .unwrap();
    assert_eq!(implicit.credit_days_applied().get(), 15);

    let loyal = CustomerRef {
        id: backoffice_core::CustomerId::new(),
        name: "Loyal".into(),
        default_credit_days: Some(60),
    };
    fx.store.insert_customer(acme.tenant.id, loyal.clone()).unwrap();
    let mut cmd = acme.credit(1, None);
    cmd.customer_id = Some(loyal.id);
    let from_customer = fx.invoices.create_invoice(&acme.scope(), cmd).await.unwrap();
    assert_eq!(from_customer.credit_days_applied().get(), 60);
    assert_eq!(from_customer.due_date(), start() + Duration::days(60));
}

#[tokio::test]
async fn numbering_follows_tenant_format() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant_with(
        "acme",
        TenantSettings {
            invoice_numbering_format: "INV-{0000}-A".into(),
            ..TenantSettings::default()
        },
    );
    let first = fx.credit_invoice(&acme, 1, 30).await;
    let second = fx.credit_invoice(&acme, 1, 30).await;
    assert_eq!(first.number(), "INV-0001-A");
    assert_eq!(second.number(), "INV-0002-A");
}

#[tokio::test]
async fn failed_creation_leaves_no_rows_and_keeps_the_number() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let first = fx.credit_invoice(&acme, 1, 30).await;
    assert_eq!(first.number(), "FAC-0001");

    // Line total overflows only once the invoice is being persisted.
    let err = fx
        .invoices
        .create_invoice(
            &acme.scope(),
            CreateInvoice {
                customer_id: Some(acme.customer.id),
                payment_type: "CREDIT".into(),
                credit_days: Some(30),
                items: vec![
                    NewInvoiceItem {
                        product_id: acme.gadget.id,
                        quantity: 2,
                        unit_price: Some(1),
                    },
                    NewInvoiceItem {
                        product_id: acme.widget.id,
                        quantity: i64::MAX / 2,
                        unit_price: None,
                    },
                ],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let ctx = acme.context();
    let page = fx
        .invoices
        .list_invoices(&ctx, &InvoiceFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    let movements = fx.store.movements(&ctx).unwrap();
    assert_eq!(movements.len(), 1);
    assert!(movements.iter().all(|m| m.invoice_id == Some(first.id())));

    let next = fx.credit_invoice(&acme, 1, 30).await;
    assert_eq!(next.number(), "FAC-0002");
}

#[tokio::test]
async fn payments_reduce_balance_and_never_overpay() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let invoice = fx.credit_invoice(&acme, 1, 30).await;
    let scope = acme.scope();

    let receipt = fx
        .invoices
        .register_payment(&scope, invoice.id(), payment(4_000))
        .await
        .unwrap();
    assert_eq!(receipt.invoice.balance(), 6_000);
    assert_eq!(receipt.invoice.paid_total(), 4_000);
    assert_eq!(receipt.invoice.version(), 2);
    assert_eq!(receipt.payment.method, "TRANSFER");
    assert_eq!(receipt.payment.reference.as_deref(), Some("REF-1"));
    assert_eq!(receipt.payment.audit.created_by, Some(acme.owner.id));

    let err = fx
        .invoices
        .register_payment(&scope, invoice.id(), payment(6_001))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("exceeds current balance 6000"));

    let err = fx
        .invoices
        .register_payment(&scope, invoice.id(), payment(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let settled = fx
        .invoices
        .register_payment(&scope, invoice.id(), payment(6_000))
        .await
        .unwrap();
    assert_eq!(settled.invoice.balance(), 0);
    assert_eq!(settled.invoice.status(), InvoiceStatus::Paid);
    assert_eq!(settled.invoice.payments().len(), 2);

    let stored = fx.invoices.get_invoice(&acme.context(), invoice.id()).await.unwrap();
    assert_eq!(stored.paid_total(), stored.total());
    assert_eq!(stored.version(), 3);

    let err = fx
        .invoices
        .register_payment(&scope, invoice.id(), payment(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn mark_paid_is_idempotent() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let invoice = fx.credit_invoice(&acme, 1, 30).await;
    fx.invoices
        .register_payment(&acme.scope(), invoice.id(), payment(2_500))
        .await
        .unwrap();

    let paid = fx.invoices.mark_paid(&acme.scope(), invoice.id()).await.unwrap();
    assert_eq!(paid.status(), InvoiceStatus::Paid);
    assert_eq!(paid.balance(), 0);
    assert_eq!(paid.payments().len(), 2);
    assert_eq!(paid.payments()[1].amount, 7_500);
    assert_eq!(paid.payments()[1].method, "MANUAL_MARK");

    let again = fx.invoices.mark_paid(&acme.scope(), invoice.id()).await.unwrap();
    assert_eq!(again.payments().len(), 2);
    assert_eq!(again.version(), paid.version());
}

#[tokio::test]
async fn payment_status_reflects_the_clock_at_write_time() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    let invoice = fx.credit_invoice(&acme, 1, 10).await;
    assert_eq!(invoice.status(), InvoiceStatus::Pending);

    fx.clock.advance(Duration::days(12));
    let receipt = fx
        .invoices
        .register_payment(&acme.scope(), invoice.id(), payment(1_000))
        .await
        .unwrap();
    assert_eq!(receipt.invoice.status(), InvoiceStatus::Overdue);
}

#[tokio::test]
async fn listing_filters_and_pages_newest_first() {
    let fx = Fixture::new();
    let acme = fx.seed_tenant("acme");
    for day in 0..5 {
        fx.clock.set(start() + Duration::days(day));
        fx.credit_invoice(&acme, 1, 30).await;
    }
    fx.invoices
        .create_invoice(
            &acme.scope(),
            CreateInvoice {
                customer_id: None,
                payment_type: "CASH".into(),
                credit_days: None,
                items: vec![NewInvoiceItem {
                    product_id: acme.widget.id,
                    quantity: 1,
                    unit_price: None,
                }],
            },
        )
        .await
        .unwrap();

    let ctx = acme.context();
    let page = fx
        .invoices
        .list_invoices(&ctx, &InvoiceFilter::default(), PageRequest::new(Some(1), Some(4)))
        .await
        .unwrap();
    assert_eq!(page.total_items, 6);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.items[0].number(), "FAC-0006");

    let credit_only = fx
        .invoices
        .list_invoices(
            &ctx,
            &InvoiceFilter {
                payment_type: Some(PaymentType::Credit),
                ..InvoiceFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(credit_only.total_items, 5);

    let searched = fx
        .invoices
        .list_invoices(
            &ctx,
            &InvoiceFilter {
                search: Some("fac-0003".into()),
                ..InvoiceFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(searched.items.len(), 1);

    let paid = fx
        .invoices
        .list_invoices(
            &ctx,
            &InvoiceFilter {
                status: Some(InvoiceStatus::Paid),
                ..InvoiceFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(paid.items.len(), 1);
    assert_eq!(paid.items[0].payment_type(), PaymentType::Cash);
}
