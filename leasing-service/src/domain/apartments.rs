use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{validation, LeaseEngine};
use crate::error::LeaseError;
use crate::models::{
    Apartment, ApartmentStatus, Contract, CreateApartment, ListApartmentsFilter, Page,
    UpdateApartment,
};

impl LeaseEngine {
    #[instrument(skip(self, input), fields(number = %input.number))]
    pub async fn create_apartment(&self, input: CreateApartment) -> Result<Apartment, LeaseError> {
        let input = validation::create_apartment(input)?;
        let now = self.clock.now();

        let apartment = Apartment {
            apartment_id: Uuid::new_v4(),
            number: input.number.trim().to_string(),
            location: input.location.trim().to_string(),
            level: input.level,
            rooms: input.rooms,
            amenities: input.amenities,
            status: input.status.as_str().to_string(),
            created_utc: now,
            updated_utc: now,
        };

        let mut uow = self.store.begin().await?;
        uow.insert_apartment(&apartment).await?;
        uow.commit().await?;

        info!(apartment_id = %apartment.apartment_id, "Apartment created");
        Ok(apartment)
    }

    /// Apartment plus its active contract, if any.
    #[instrument(skip(self))]
    pub async fn get_apartment(
        &self,
        apartment_id: Uuid,
    ) -> Result<(Apartment, Option<Contract>), LeaseError> {
        let mut uow = self.store.snapshot().await?;
        let apartment = uow
            .get_apartment(apartment_id)
            .await?
            .ok_or(LeaseError::ApartmentNotFound(apartment_id))?;
        let active = uow
            .active_contracts_for_apartment(apartment_id)
            .await?
            .into_iter()
            .next();
        Ok((apartment, active))
    }

    /// Edit an apartment. Status may move between Available and
    /// UnderMaintenance; occupancy is left to the contract lifecycle.
    #[instrument(skip(self, patch))]
    pub async fn update_apartment(
        &self,
        apartment_id: Uuid,
        patch: UpdateApartment,
    ) -> Result<Apartment, LeaseError> {
        let patch = validation::update_apartment(patch)?;

        let mut uow = self.store.begin().await?;
        let mut apartment = uow
            .get_apartment(apartment_id)
            .await?
            .ok_or(LeaseError::ApartmentNotFound(apartment_id))?;

        if let Some(status) = patch.status {
            if status != apartment.status() {
                if apartment.status() == ApartmentStatus::Occupied {
                    warn!(%apartment_id, "Status change rejected: apartment occupied");
                    return Err(LeaseError::ApartmentOccupied(apartment_id));
                }
                apartment.status = status.as_str().to_string();
            }
        }
        if let Some(number) = patch.number {
            apartment.number = number.trim().to_string();
        }
        if let Some(location) = patch.location {
            apartment.location = location.trim().to_string();
        }
        if patch.level.is_some() {
            apartment.level = patch.level;
        }
        if patch.rooms.is_some() {
            apartment.rooms = patch.rooms;
        }
        if let Some(amenities) = patch.amenities {
            apartment.amenities = amenities;
        }
        apartment.updated_utc = self.clock.now();

        uow.update_apartment(&apartment).await?;
        uow.commit().await?;

        info!(%apartment_id, status = %apartment.status, "Apartment updated");
        Ok(apartment)
    }

    /// Remove an apartment that is not occupied and has no contract or
    /// maintenance history.
    #[instrument(skip(self))]
    pub async fn delete_apartment(&self, apartment_id: Uuid) -> Result<(), LeaseError> {
        let mut uow = self.store.begin().await?;
        let apartment = uow
            .get_apartment(apartment_id)
            .await?
            .ok_or(LeaseError::ApartmentNotFound(apartment_id))?;

        if apartment.status() == ApartmentStatus::Occupied {
            warn!(%apartment_id, "Delete rejected: apartment occupied");
            return Err(LeaseError::ApartmentOccupied(apartment_id));
        }
        if uow.apartment_has_records(apartment_id).await? {
            warn!(%apartment_id, "Delete rejected: apartment has history");
            return Err(LeaseError::ApartmentInUse(apartment_id));
        }

        uow.delete_apartment(apartment_id).await?;
        uow.commit().await?;

        info!(%apartment_id, "Apartment deleted");
        Ok(())
    }

    #[instrument(skip(self, filter))]
    pub async fn list_apartments(
        &self,
        filter: &ListApartmentsFilter,
    ) -> Result<Page<Apartment>, LeaseError> {
        let mut uow = self.store.snapshot().await?;
        Ok(uow.list_apartments(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::error::{ErrorKind, LeaseError};
    use crate::models::{
        ApartmentStatus, CreateApartment, ListApartmentsFilter, UpdateApartment, UpdateContract,
    };

    #[tokio::test]
    async fn test_create_and_get_apartment() {
        let fx = engine_on("2024-01-10").await;
        let id = apartment(&fx.engine, "A-101").await;

        let (apartment, active) = fx.engine.get_apartment(id).await.unwrap();
        assert_eq!(apartment.number, "A-101");
        assert_eq!(apartment.status(), ApartmentStatus::Available);
        assert!(active.is_none());
    }

    #[tokio::test]
    async fn test_create_occupied_apartment_rejected() {
        let fx = engine_on("2024-01-10").await;
        let err = fx
            .engine
            .create_apartment(CreateApartment {
                number: "A-1".to_string(),
                location: "Block A".to_string(),
                level: None,
                rooms: None,
                amenities: vec![],
                status: ApartmentStatus::Occupied,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_list_apartments_by_status() {
        let fx = engine_on("2024-01-10").await;
        let occupied = apartment(&fx.engine, "A-1").await;
        apartment(&fx.engine, "A-2").await;
        fx.engine
            .create_contract(contract_input(occupied, "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();

        let page = fx
            .engine
            .list_apartments(&ListApartmentsFilter {
                status: Some(ApartmentStatus::Available),
                page_size: 10,
                page_token: None,
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].number, "A-2");
    }

    #[tokio::test]
    async fn test_maintenance_status_round_trip_makes_apartment_leasable() {
        let fx = engine_on("2024-01-10").await;
        let id = apartment(&fx.engine, "A-7").await;

        let updated = fx
            .engine
            .update_apartment(
                id,
                UpdateApartment {
                    status: Some(ApartmentStatus::UnderMaintenance),
                    rooms: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status(), ApartmentStatus::UnderMaintenance);
        assert_eq!(updated.rooms, Some(3));
        assert_eq!(updated.number, "A-7");

        let err = fx
            .engine
            .create_contract(contract_input(id, "monthly", "2024-02-01", 1, "1200"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::ApartmentNotAvailable { .. }));

        fx.engine
            .update_apartment(
                id,
                UpdateApartment {
                    status: Some(ApartmentStatus::Available),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        fx.engine
            .create_contract(contract_input(id, "monthly", "2024-02-01", 1, "1200"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_never_touches_occupancy() {
        let fx = engine_on("2024-01-10").await;
        let id = apartment(&fx.engine, "A-1").await;

        let err = fx
            .engine
            .update_apartment(
                id,
                UpdateApartment {
                    status: Some(ApartmentStatus::Occupied),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        fx.engine
            .create_contract(contract_input(id, "monthly", "2024-01-01", 1, "1200"))
            .await
            .unwrap();
        let err = fx
            .engine
            .update_apartment(
                id,
                UpdateApartment {
                    status: Some(ApartmentStatus::Available),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::ApartmentOccupied(_)));
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        // Descriptive edits are still fine while occupied.
        let renamed = fx
            .engine
            .update_apartment(
                id,
                UpdateApartment {
                    location: Some("Block B".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.location, "Block B");
        assert_eq!(renamed.status(), ApartmentStatus::Occupied);
    }

    #[tokio::test]
    async fn test_delete_guards_occupied_and_referenced() {
        let fx = engine_on("2024-01-10").await;
        let free = apartment(&fx.engine, "A-1").await;
        fx.engine.delete_apartment(free).await.unwrap();
        let err = fx.engine.get_apartment(free).await.unwrap_err();
        assert!(matches!(err, LeaseError::ApartmentNotFound(_)));

        let leased = apartment(&fx.engine, "A-2").await;
        let (contract, _) = fx
            .engine
            .create_contract(contract_input(leased, "yearly", "2024-01-01", 1, "6000"))
            .await
            .unwrap();
        let err = fx.engine.delete_apartment(leased).await.unwrap_err();
        assert!(matches!(err, LeaseError::ApartmentOccupied(_)));

        // Terminated, but the contract still points at it.
        fx.engine
            .update_contract(
                contract.contract_id,
                UpdateContract {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = fx.engine.delete_apartment(leased).await.unwrap_err();
        assert!(matches!(err, LeaseError::ApartmentInUse(_)));
        assert_eq!(err.code(), "APARTMENT_IN_USE");
        assert!(fx.engine.get_apartment(leased).await.is_ok());
    }
}
