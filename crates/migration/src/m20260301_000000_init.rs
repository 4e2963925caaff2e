//! Initial schema: creates every table of the booking and finance backend.
//!
//! - `users`, `deposits`, `recredits`: beneficiaries and their credit
//! - `offerers`, `user_offerers`, `venues`, `bank_accounts` and the venue links
//! - `offers`, `stocks`, `activation_codes`, `bookings`
//! - `collective_offers`, `collective_stocks`, `collective_bookings`
//! - `custom_reimbursement_rules`
//! - `finance_incidents`, `booking_finance_incidents`
//! - `finance_events`, `pricings`, `pricing_lines`, `pricing_logs`
//! - `cashflow_batches`, `cashflows`, `cashflow_pricings`
//! - `invoices`, `invoice_cashflows`
//! - `app_locks`

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Email,
    Password,
    FirstName,
    LastName,
    DateOfBirth,
    ValidatedBirthDate,
    Role,
    DateCreated,
}

#[derive(Iden)]
enum Deposits {
    Table,
    Id,
    UserId,
    DepositType,
    Version,
    Amount,
    Source,
    ExpirationDate,
    DateCreated,
}

#[derive(Iden)]
enum Recredits {
    Table,
    Id,
    DepositId,
    RecreditType,
    Amount,
    DateCreated,
}

#[derive(Iden)]
enum Offerers {
    Table,
    Id,
    Name,
    IsActive,
    IsValidated,
    DateCreated,
}

#[derive(Iden)]
enum UserOfferers {
    Table,
    Id,
    UserId,
    OffererId,
    DateCreated,
}

#[derive(Iden)]
enum Venues {
    Table,
    Id,
    OffererId,
    Name,
    IsVirtual,
    BookingEmail,
    DepartmentCode,
    IsValidated,
}

#[derive(Iden)]
enum BankAccounts {
    Table,
    Id,
    OffererId,
    Label,
    Iban,
    Status,
    DateCreated,
}

#[derive(Iden)]
enum VenueBankAccountLinks {
    Table,
    Id,
    VenueId,
    BankAccountId,
    TimespanStart,
    TimespanEnd,
}

#[derive(Iden)]
enum VenuePricingPointLinks {
    Table,
    Id,
    VenueId,
    PricingPointId,
    TimespanStart,
    TimespanEnd,
}

#[derive(Iden)]
enum Offers {
    Table,
    Id,
    VenueId,
    Name,
    SubcategoryId,
    IsDuo,
    Url,
    IsActive,
    Validation,
    LastValidationDate,
    LastValidationType,
    LastValidationAuthorId,
    DateCreated,
}

#[derive(Iden)]
enum Stocks {
    Table,
    Id,
    OfferId,
    Price,
    Quantity,
    DnBookedQuantity,
    BeginningDatetime,
    BookingLimitDatetime,
    IsSoftDeleted,
    DateCreated,
    DateModified,
}

#[derive(Iden)]
enum Bookings {
    Table,
    Id,
    UserId,
    DepositId,
    StockId,
    VenueId,
    OffererId,
    Quantity,
    Amount,
    Token,
    Status,
    CancellationReason,
    ValidationAuthorType,
    DateCreated,
    DateUsed,
    CancellationDate,
    CancellationLimitDate,
    ReimbursementDate,
    DisplayAsEnded,
}

#[derive(Iden)]
enum ActivationCodes {
    Table,
    Id,
    StockId,
    Code,
    ExpirationDate,
    BookingId,
}

#[derive(Iden)]
enum CollectiveOffers {
    Table,
    Id,
    VenueId,
    Name,
    Formats,
    IsActive,
    Validation,
    LastValidationDate,
    LastValidationType,
    LastValidationAuthorId,
    Institution,
    DateCreated,
}

#[derive(Iden)]
enum CollectiveStocks {
    Table,
    Id,
    CollectiveOfferId,
    Price,
    NumberOfTickets,
    BeginningDatetime,
    BookingLimitDatetime,
    DateCreated,
}

#[derive(Iden)]
enum CollectiveBookings {
    Table,
    Id,
    CollectiveStockId,
    VenueId,
    OffererId,
    Institution,
    Status,
    CancellationReason,
    DateCreated,
    ConfirmationDate,
    DateUsed,
    CancellationDate,
    CancellationLimitDate,
    ReimbursementDate,
}

#[derive(Iden)]
enum CustomReimbursementRules {
    Table,
    Id,
    OfferId,
    VenueId,
    OffererId,
    Subcategories,
    Amount,
    Rate,
    TimespanStart,
    TimespanEnd,
}

#[derive(Iden)]
enum FinanceIncidents {
    Table,
    Id,
    Kind,
    Status,
    VenueId,
    Details,
    ForceDebitNote,
    ValidationDate,
}

#[derive(Iden)]
enum BookingFinanceIncidents {
    Table,
    Id,
    IncidentId,
    BookingId,
    CollectiveBookingId,
    BeneficiaryId,
    NewTotalAmount,
}

#[derive(Iden)]
enum FinanceEvents {
    Table,
    Id,
    Motive,
    Status,
    CreationDate,
    ValueDate,
    PricingOrderingDate,
    VenueId,
    PricingPointId,
    BookingId,
    CollectiveBookingId,
    BookingFinanceIncidentId,
}

#[derive(Iden)]
enum Pricings {
    Table,
    Id,
    Status,
    CreationDate,
    ValueDate,
    Amount,
    StandardRule,
    CustomRuleId,
    Revenue,
    PricingPointId,
    VenueId,
    BookingId,
    CollectiveBookingId,
    EventId,
}

#[derive(Iden)]
enum PricingLines {
    Table,
    Id,
    PricingId,
    Amount,
    Category,
}

#[derive(Iden)]
enum PricingLogs {
    Table,
    Id,
    PricingId,
    Timestamp,
    StatusBefore,
    StatusAfter,
    Reason,
}

#[derive(Iden)]
enum CashflowBatches {
    Table,
    Id,
    Label,
    Cutoff,
    CreationDate,
}

#[derive(Iden)]
enum Cashflows {
    Table,
    Id,
    BatchId,
    BankAccountId,
    Status,
    Amount,
    CreationDate,
}

#[derive(Iden)]
enum CashflowPricings {
    Table,
    CashflowId,
    PricingId,
}

#[derive(Iden)]
enum Invoices {
    Table,
    Id,
    Reference,
    BankAccountId,
    Amount,
    Date,
}

#[derive(Iden)]
enum InvoiceCashflows {
    Table,
    InvoiceId,
    CashflowId,
}

#[derive(Iden)]
enum AppLocks {
    Table,
    Name,
    AcquiredAt,
    ExpiresAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users and their credit
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(ColumnDef::new(Users::FirstName).string())
                    .col(ColumnDef::new(Users::LastName).string())
                    .col(ColumnDef::new(Users::DateOfBirth).date())
                    .col(ColumnDef::new(Users::ValidatedBirthDate).date())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(
                        ColumnDef::new(Users::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-email-unique")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Deposits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deposits::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Deposits::UserId).uuid().not_null())
                    .col(ColumnDef::new(Deposits::DepositType).string().not_null())
                    .col(ColumnDef::new(Deposits::Version).integer().not_null())
                    .col(ColumnDef::new(Deposits::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Deposits::Source).string().not_null())
                    .col(ColumnDef::new(Deposits::ExpirationDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Deposits::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-deposits-user_id")
                            .from(Deposits::Table, Deposits::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-deposits-user_id")
                    .table(Deposits::Table)
                    .col(Deposits::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Recredits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Recredits::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Recredits::DepositId).uuid().not_null())
                    .col(ColumnDef::new(Recredits::RecreditType).string().not_null())
                    .col(ColumnDef::new(Recredits::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Recredits::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-recredits-deposit_id")
                            .from(Recredits::Table, Recredits::DepositId)
                            .to(Deposits::Table, Deposits::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Offerers, venues and bank accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Offerers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Offerers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Offerers::Name).string().not_null())
                    .col(ColumnDef::new(Offerers::IsActive).boolean().not_null())
                    .col(ColumnDef::new(Offerers::IsValidated).boolean().not_null())
                    .col(
                        ColumnDef::new(Offerers::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserOfferers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserOfferers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserOfferers::UserId).uuid().not_null())
                    .col(ColumnDef::new(UserOfferers::OffererId).uuid().not_null())
                    .col(
                        ColumnDef::new(UserOfferers::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-user_offerers-user_id")
                            .from(UserOfferers::Table, UserOfferers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-user_offerers-offerer_id")
                            .from(UserOfferers::Table, UserOfferers::OffererId)
                            .to(Offerers::Table, Offerers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-user_offerers-user_id-offerer_id-unique")
                    .table(UserOfferers::Table)
                    .col(UserOfferers::UserId)
                    .col(UserOfferers::OffererId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Venues::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Venues::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Venues::OffererId).uuid().not_null())
                    .col(ColumnDef::new(Venues::Name).string().not_null())
                    .col(ColumnDef::new(Venues::IsVirtual).boolean().not_null())
                    .col(ColumnDef::new(Venues::BookingEmail).string())
                    .col(ColumnDef::new(Venues::DepartmentCode).string())
                    .col(ColumnDef::new(Venues::IsValidated).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-venues-offerer_id")
                            .from(Venues::Table, Venues::OffererId)
                            .to(Offerers::Table, Offerers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BankAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BankAccounts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BankAccounts::OffererId).uuid().not_null())
                    .col(ColumnDef::new(BankAccounts::Label).string().not_null())
                    .col(ColumnDef::new(BankAccounts::Iban).string().not_null())
                    .col(ColumnDef::new(BankAccounts::Status).string().not_null())
                    .col(
                        ColumnDef::new(BankAccounts::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bank_accounts-offerer_id")
                            .from(BankAccounts::Table, BankAccounts::OffererId)
                            .to(Offerers::Table, Offerers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VenueBankAccountLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VenueBankAccountLinks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VenueBankAccountLinks::VenueId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenueBankAccountLinks::BankAccountId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenueBankAccountLinks::TimespanStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenueBankAccountLinks::TimespanEnd)
                            .timestamp_with_time_zone(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-venue_bank_account_links-venue_id")
                            .from(VenueBankAccountLinks::Table, VenueBankAccountLinks::VenueId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-venue_bank_account_links-bank_account_id")
                            .from(
                                VenueBankAccountLinks::Table,
                                VenueBankAccountLinks::BankAccountId,
                            )
                            .to(BankAccounts::Table, BankAccounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VenuePricingPointLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VenuePricingPointLinks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VenuePricingPointLinks::VenueId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenuePricingPointLinks::PricingPointId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenuePricingPointLinks::TimespanStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VenuePricingPointLinks::TimespanEnd)
                            .timestamp_with_time_zone(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-venue_pricing_point_links-venue_id")
                            .from(
                                VenuePricingPointLinks::Table,
                                VenuePricingPointLinks::VenueId,
                            )
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-venue_pricing_point_links-pricing_point_id")
                            .from(
                                VenuePricingPointLinks::Table,
                                VenuePricingPointLinks::PricingPointId,
                            )
                            .to(Venues::Table, Venues::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Offers, stocks and bookings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Offers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Offers::VenueId).uuid().not_null())
                    .col(ColumnDef::new(Offers::Name).string().not_null())
                    .col(ColumnDef::new(Offers::SubcategoryId).string().not_null())
                    .col(ColumnDef::new(Offers::IsDuo).boolean().not_null())
                    .col(ColumnDef::new(Offers::Url).string())
                    .col(ColumnDef::new(Offers::IsActive).boolean().not_null())
                    .col(ColumnDef::new(Offers::Validation).string().not_null())
                    .col(ColumnDef::new(Offers::LastValidationDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Offers::LastValidationType).string())
                    .col(ColumnDef::new(Offers::LastValidationAuthorId).uuid())
                    .col(
                        ColumnDef::new(Offers::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-offers-venue_id")
                            .from(Offers::Table, Offers::VenueId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Stocks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Stocks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Stocks::OfferId).uuid().not_null())
                    .col(ColumnDef::new(Stocks::Price).big_integer().not_null())
                    .col(ColumnDef::new(Stocks::Quantity).big_integer())
                    .col(
                        ColumnDef::new(Stocks::DnBookedQuantity)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Stocks::BeginningDatetime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Stocks::BookingLimitDatetime).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Stocks::IsSoftDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Stocks::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Stocks::DateModified)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-stocks-offer_id")
                            .from(Stocks::Table, Stocks::OfferId)
                            .to(Offers::Table, Offers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stocks-offer_id")
                    .table(Stocks::Table)
                    .col(Stocks::OfferId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bookings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Bookings::UserId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::DepositId).uuid())
                    .col(ColumnDef::new(Bookings::StockId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::VenueId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::OffererId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::Quantity).big_integer().not_null())
                    .col(ColumnDef::new(Bookings::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Bookings::Token).string().not_null())
                    .col(ColumnDef::new(Bookings::Status).string().not_null())
                    .col(ColumnDef::new(Bookings::CancellationReason).string())
                    .col(ColumnDef::new(Bookings::ValidationAuthorType).string())
                    .col(
                        ColumnDef::new(Bookings::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bookings::DateUsed).timestamp_with_time_zone())
                    .col(ColumnDef::new(Bookings::CancellationDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Bookings::CancellationLimitDate)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(Bookings::ReimbursementDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Bookings::DisplayAsEnded).boolean())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bookings-user_id")
                            .from(Bookings::Table, Bookings::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bookings-deposit_id")
                            .from(Bookings::Table, Bookings::DepositId)
                            .to(Deposits::Table, Deposits::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bookings-stock_id")
                            .from(Bookings::Table, Bookings::StockId)
                            .to(Stocks::Table, Stocks::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bookings-venue_id")
                            .from(Bookings::Table, Bookings::VenueId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bookings-offerer_id")
                            .from(Bookings::Table, Bookings::OffererId)
                            .to(Offerers::Table, Offerers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bookings-token-unique")
                    .table(Bookings::Table)
                    .col(Bookings::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bookings-user_id")
                    .table(Bookings::Table)
                    .col(Bookings::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bookings-stock_id-status")
                    .table(Bookings::Table)
                    .col(Bookings::StockId)
                    .col(Bookings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivationCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivationCodes::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActivationCodes::StockId).uuid().not_null())
                    .col(ColumnDef::new(ActivationCodes::Code).string().not_null())
                    .col(
                        ColumnDef::new(ActivationCodes::ExpirationDate)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(ActivationCodes::BookingId).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activation_codes-stock_id")
                            .from(ActivationCodes::Table, ActivationCodes::StockId)
                            .to(Stocks::Table, Stocks::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-activation_codes-booking_id")
                            .from(ActivationCodes::Table, ActivationCodes::BookingId)
                            .to(Bookings::Table, Bookings::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-activation_codes-stock_id-code-unique")
                    .table(ActivationCodes::Table)
                    .col(ActivationCodes::StockId)
                    .col(ActivationCodes::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Collective offers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CollectiveOffers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollectiveOffers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CollectiveOffers::VenueId).uuid().not_null())
                    .col(ColumnDef::new(CollectiveOffers::Name).string().not_null())
                    .col(ColumnDef::new(CollectiveOffers::Formats).string().not_null())
                    .col(ColumnDef::new(CollectiveOffers::IsActive).boolean().not_null())
                    .col(
                        ColumnDef::new(CollectiveOffers::Validation)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectiveOffers::LastValidationDate)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(CollectiveOffers::LastValidationType).string())
                    .col(ColumnDef::new(CollectiveOffers::LastValidationAuthorId).uuid())
                    .col(ColumnDef::new(CollectiveOffers::Institution).string())
                    .col(
                        ColumnDef::new(CollectiveOffers::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collective_offers-venue_id")
                            .from(CollectiveOffers::Table, CollectiveOffers::VenueId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CollectiveStocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollectiveStocks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CollectiveStocks::CollectiveOfferId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CollectiveStocks::Price).big_integer().not_null())
                    .col(
                        ColumnDef::new(CollectiveStocks::NumberOfTickets)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectiveStocks::BeginningDatetime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectiveStocks::BookingLimitDatetime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectiveStocks::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collective_stocks-collective_offer_id")
                            .from(CollectiveStocks::Table, CollectiveStocks::CollectiveOfferId)
                            .to(CollectiveOffers::Table, CollectiveOffers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-collective_stocks-collective_offer_id-unique")
                    .table(CollectiveStocks::Table)
                    .col(CollectiveStocks::CollectiveOfferId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CollectiveBookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollectiveBookings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CollectiveBookings::CollectiveStockId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CollectiveBookings::VenueId).uuid().not_null())
                    .col(ColumnDef::new(CollectiveBookings::OffererId).uuid().not_null())
                    .col(
                        ColumnDef::new(CollectiveBookings::Institution)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CollectiveBookings::Status).string().not_null())
                    .col(ColumnDef::new(CollectiveBookings::CancellationReason).string())
                    .col(
                        ColumnDef::new(CollectiveBookings::DateCreated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectiveBookings::ConfirmationDate)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(CollectiveBookings::DateUsed).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CollectiveBookings::CancellationDate)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(CollectiveBookings::CancellationLimitDate)
                            .timestamp_with_time_zone(),
                    )
                    .col(
                        ColumnDef::new(CollectiveBookings::ReimbursementDate)
                            .timestamp_with_time_zone(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collective_bookings-collective_stock_id")
                            .from(
                                CollectiveBookings::Table,
                                CollectiveBookings::CollectiveStockId,
                            )
                            .to(CollectiveStocks::Table, CollectiveStocks::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collective_bookings-venue_id")
                            .from(CollectiveBookings::Table, CollectiveBookings::VenueId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collective_bookings-offerer_id")
                            .from(CollectiveBookings::Table, CollectiveBookings::OffererId)
                            .to(Offerers::Table, Offerers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Reimbursement rules and finance incidents
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CustomReimbursementRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CustomReimbursementRules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CustomReimbursementRules::OfferId).uuid())
                    .col(ColumnDef::new(CustomReimbursementRules::VenueId).uuid())
                    .col(ColumnDef::new(CustomReimbursementRules::OffererId).uuid())
                    .col(
                        ColumnDef::new(CustomReimbursementRules::Subcategories)
                            .string()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(CustomReimbursementRules::Amount).big_integer())
                    .col(ColumnDef::new(CustomReimbursementRules::Rate).big_integer())
                    .col(
                        ColumnDef::new(CustomReimbursementRules::TimespanStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomReimbursementRules::TimespanEnd)
                            .timestamp_with_time_zone(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-custom_reimbursement_rules-offer_id")
                            .from(
                                CustomReimbursementRules::Table,
                                CustomReimbursementRules::OfferId,
                            )
                            .to(Offers::Table, Offers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-custom_reimbursement_rules-venue_id")
                            .from(
                                CustomReimbursementRules::Table,
                                CustomReimbursementRules::VenueId,
                            )
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-custom_reimbursement_rules-offerer_id")
                            .from(
                                CustomReimbursementRules::Table,
                                CustomReimbursementRules::OffererId,
                            )
                            .to(Offerers::Table, Offerers::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FinanceIncidents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinanceIncidents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FinanceIncidents::Kind).string().not_null())
                    .col(ColumnDef::new(FinanceIncidents::Status).string().not_null())
                    .col(ColumnDef::new(FinanceIncidents::VenueId).uuid().not_null())
                    .col(
                        ColumnDef::new(FinanceIncidents::Details)
                            .string()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(FinanceIncidents::ForceDebitNote)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FinanceIncidents::ValidationDate)
                            .timestamp_with_time_zone(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-finance_incidents-venue_id")
                            .from(FinanceIncidents::Table, FinanceIncidents::VenueId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BookingFinanceIncidents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BookingFinanceIncidents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BookingFinanceIncidents::IncidentId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BookingFinanceIncidents::BookingId).uuid())
                    .col(ColumnDef::new(BookingFinanceIncidents::CollectiveBookingId).uuid())
                    .col(ColumnDef::new(BookingFinanceIncidents::BeneficiaryId).uuid())
                    .col(
                        ColumnDef::new(BookingFinanceIncidents::NewTotalAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-booking_finance_incidents-incident_id")
                            .from(
                                BookingFinanceIncidents::Table,
                                BookingFinanceIncidents::IncidentId,
                            )
                            .to(FinanceIncidents::Table, FinanceIncidents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-booking_finance_incidents-booking_id")
                            .from(
                                BookingFinanceIncidents::Table,
                                BookingFinanceIncidents::BookingId,
                            )
                            .to(Bookings::Table, Bookings::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-booking_finance_incidents-collective_booking_id")
                            .from(
                                BookingFinanceIncidents::Table,
                                BookingFinanceIncidents::CollectiveBookingId,
                            )
                            .to(CollectiveBookings::Table, CollectiveBookings::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Finance events and pricings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(FinanceEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinanceEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FinanceEvents::Motive).string().not_null())
                    .col(ColumnDef::new(FinanceEvents::Status).string().not_null())
                    .col(
                        ColumnDef::new(FinanceEvents::CreationDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinanceEvents::ValueDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FinanceEvents::PricingOrderingDate)
                            .timestamp_with_time_zone(),
                    )
                    .col(ColumnDef::new(FinanceEvents::VenueId).uuid().not_null())
                    .col(ColumnDef::new(FinanceEvents::PricingPointId).uuid())
                    .col(ColumnDef::new(FinanceEvents::BookingId).uuid())
                    .col(ColumnDef::new(FinanceEvents::CollectiveBookingId).uuid())
                    .col(ColumnDef::new(FinanceEvents::BookingFinanceIncidentId).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-finance_events-venue_id")
                            .from(FinanceEvents::Table, FinanceEvents::VenueId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-finance_events-pricing_point_id")
                            .from(FinanceEvents::Table, FinanceEvents::PricingPointId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-finance_events-booking_id")
                            .from(FinanceEvents::Table, FinanceEvents::BookingId)
                            .to(Bookings::Table, Bookings::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-finance_events-collective_booking_id")
                            .from(FinanceEvents::Table, FinanceEvents::CollectiveBookingId)
                            .to(CollectiveBookings::Table, CollectiveBookings::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-finance_events-booking_finance_incident_id")
                            .from(
                                FinanceEvents::Table,
                                FinanceEvents::BookingFinanceIncidentId,
                            )
                            .to(BookingFinanceIncidents::Table, BookingFinanceIncidents::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-finance_events-pricing_point_id-status")
                    .table(FinanceEvents::Table)
                    .col(FinanceEvents::PricingPointId)
                    .col(FinanceEvents::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Pricings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Pricings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Pricings::Status).string().not_null())
                    .col(
                        ColumnDef::new(Pricings::CreationDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Pricings::ValueDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Pricings::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Pricings::StandardRule)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Pricings::CustomRuleId).uuid())
                    .col(ColumnDef::new(Pricings::Revenue).big_integer().not_null())
                    .col(ColumnDef::new(Pricings::PricingPointId).uuid().not_null())
                    .col(ColumnDef::new(Pricings::VenueId).uuid().not_null())
                    .col(ColumnDef::new(Pricings::BookingId).uuid())
                    .col(ColumnDef::new(Pricings::CollectiveBookingId).uuid())
                    .col(ColumnDef::new(Pricings::EventId).uuid().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pricings-event_id")
                            .from(Pricings::Table, Pricings::EventId)
                            .to(FinanceEvents::Table, FinanceEvents::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pricings-custom_rule_id")
                            .from(Pricings::Table, Pricings::CustomRuleId)
                            .to(CustomReimbursementRules::Table, CustomReimbursementRules::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pricings-pricing_point_id")
                            .from(Pricings::Table, Pricings::PricingPointId)
                            .to(Venues::Table, Venues::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pricings-booking_id")
                            .from(Pricings::Table, Pricings::BookingId)
                            .to(Bookings::Table, Bookings::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pricings-collective_booking_id")
                            .from(Pricings::Table, Pricings::CollectiveBookingId)
                            .to(CollectiveBookings::Table, CollectiveBookings::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-pricings-pricing_point_id-status")
                    .table(Pricings::Table)
                    .col(Pricings::PricingPointId)
                    .col(Pricings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-pricings-booking_id")
                    .table(Pricings::Table)
                    .col(Pricings::BookingId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PricingLines::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PricingLines::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PricingLines::PricingId).uuid().not_null())
                    .col(ColumnDef::new(PricingLines::Amount).big_integer().not_null())
                    .col(ColumnDef::new(PricingLines::Category).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pricing_lines-pricing_id")
                            .from(PricingLines::Table, PricingLines::PricingId)
                            .to(Pricings::Table, Pricings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PricingLogs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PricingLogs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(PricingLogs::PricingId).uuid().not_null())
                    .col(
                        ColumnDef::new(PricingLogs::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PricingLogs::StatusBefore).string().not_null())
                    .col(ColumnDef::new(PricingLogs::StatusAfter).string().not_null())
                    .col(ColumnDef::new(PricingLogs::Reason).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-pricing_logs-pricing_id")
                            .from(PricingLogs::Table, PricingLogs::PricingId)
                            .to(Pricings::Table, Pricings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Cashflows and invoices
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CashflowBatches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashflowBatches::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CashflowBatches::Label).string().not_null())
                    .col(
                        ColumnDef::new(CashflowBatches::Cutoff)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashflowBatches::CreationDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-cashflow_batches-label-unique")
                    .table(CashflowBatches::Table)
                    .col(CashflowBatches::Label)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Cashflows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Cashflows::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Cashflows::BatchId).uuid().not_null())
                    .col(ColumnDef::new(Cashflows::BankAccountId).uuid().not_null())
                    .col(ColumnDef::new(Cashflows::Status).string().not_null())
                    .col(ColumnDef::new(Cashflows::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Cashflows::CreationDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-cashflows-batch_id")
                            .from(Cashflows::Table, Cashflows::BatchId)
                            .to(CashflowBatches::Table, CashflowBatches::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-cashflows-bank_account_id")
                            .from(Cashflows::Table, Cashflows::BankAccountId)
                            .to(BankAccounts::Table, BankAccounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashflowPricings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CashflowPricings::CashflowId).uuid().not_null())
                    .col(ColumnDef::new(CashflowPricings::PricingId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(CashflowPricings::CashflowId)
                            .col(CashflowPricings::PricingId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-cashflow_pricings-cashflow_id")
                            .from(CashflowPricings::Table, CashflowPricings::CashflowId)
                            .to(Cashflows::Table, Cashflows::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-cashflow_pricings-pricing_id")
                            .from(CashflowPricings::Table, CashflowPricings::PricingId)
                            .to(Pricings::Table, Pricings::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invoices::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Invoices::Reference).string().not_null())
                    .col(ColumnDef::new(Invoices::BankAccountId).uuid().not_null())
                    .col(ColumnDef::new(Invoices::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Invoices::Date)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoices-bank_account_id")
                            .from(Invoices::Table, Invoices::BankAccountId)
                            .to(BankAccounts::Table, BankAccounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invoices-reference-unique")
                    .table(Invoices::Table)
                    .col(Invoices::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InvoiceCashflows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InvoiceCashflows::InvoiceId).uuid().not_null())
                    .col(ColumnDef::new(InvoiceCashflows::CashflowId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(InvoiceCashflows::InvoiceId)
                            .col(InvoiceCashflows::CashflowId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoice_cashflows-invoice_id")
                            .from(InvoiceCashflows::Table, InvoiceCashflows::InvoiceId)
                            .to(Invoices::Table, Invoices::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-invoice_cashflows-cashflow_id")
                            .from(InvoiceCashflows::Table, InvoiceCashflows::CashflowId)
                            .to(Cashflows::Table, Cashflows::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Application locks
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AppLocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppLocks::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AppLocks::AcquiredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AppLocks::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse order of creation
        manager
            .drop_table(Table::drop().table(AppLocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InvoiceCashflows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CashflowPricings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cashflows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CashflowBatches::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PricingLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PricingLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pricings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FinanceEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BookingFinanceIncidents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FinanceIncidents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CustomReimbursementRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CollectiveBookings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CollectiveStocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CollectiveOffers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ActivationCodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stocks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VenuePricingPointLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VenueBankAccountLinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Venues::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserOfferers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offerers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Recredits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deposits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
